use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use ollachat_llm::{ProviderMessage, Role};
use uuid::Uuid;

// Macro keeps the id wrappers structurally identical.
macro_rules! define_chat_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

define_chat_id!(MessageId);
define_chat_id!(AttachmentId);

/// A named binary blob attached to a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    id: AttachmentId,
    name: String,
    data: Vec<u8>,
    mime_type: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            id: AttachmentId::new_v7(),
            name: name.into(),
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn id(&self) -> AttachmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// One chat turn.
///
/// `id`, `role` and the creation time are fixed at construction; content and
/// images change only through [`Message::apply_edit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    created_at_unix_seconds: u64,
    images: Vec<Vec<u8>>,
    attachments: Vec<Attachment>,
    is_edited: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v7(),
            role,
            content: content.into(),
            created_at_unix_seconds: current_unix_timestamp_seconds(),
            images: Vec::new(),
            attachments: Vec::new(),
            is_edited: false,
        }
    }

    pub fn user(content: impl Into<String>, images: Vec<Vec<u8>>) -> Self {
        Self::new(Role::User, content).with_images(images)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_images(mut self, images: Vec<Vec<u8>>) -> Self {
        self.images = images;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at_unix_seconds(&self) -> u64 {
        self.created_at_unix_seconds
    }

    pub fn images(&self) -> &[Vec<u8>] {
        &self.images
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn is_edited(&self) -> bool {
        self.is_edited
    }

    /// Overwrites content and images in place and flags the turn as edited.
    pub fn apply_edit(&mut self, content: impl Into<String>, images: Vec<Vec<u8>>) {
        self.content = content.into();
        self.images = images;
        self.is_edited = true;
    }

    pub fn to_provider_message(&self) -> ProviderMessage {
        ProviderMessage::new(self.role, self.content.clone()).with_images(self.images.clone())
    }
}

/// Append-only, ordered chat transcript keyed by message id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) -> MessageId {
        let id = message.id();
        self.messages.push(message);
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| message.id() == id)
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|message| message.id() == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn to_provider_messages(&self) -> Vec<ProviderMessage> {
        self.messages.iter().map(Message::to_provider_message).collect()
    }
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}
