#![deny(unsafe_code)]

pub mod attachments;
pub mod chat;
pub mod command;
pub mod settings;
