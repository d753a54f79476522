//! Request and response bodies of the Ollama HTTP API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::model::Model;
use super::provider::{ChatRequest, ProviderMessage, Role};

const IMAGE_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

pub fn encode_image_data_uri(image: &[u8]) -> String {
    format!("{IMAGE_DATA_URI_PREFIX}{}", STANDARD.encode(image))
}

/// Accepts any `data:<mime>;base64,` URI, not only the JPEG prefix this crate writes.
pub fn decode_image_data_uri(uri: &str) -> Option<Vec<u8>> {
    let (header, payload) = uri.split_once(',')?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl From<&ProviderMessage> for WireMessage {
    fn from(message: &ProviderMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            images: message
                .images
                .iter()
                .map(|image| encode_image_data_uri(image))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequestBody {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
}

impl From<&ChatRequest> for ChatRequestBody {
    fn from(request: &ChatRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatResponseBody {
    pub message: ChatReply,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequestBody {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateResponseBody {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireModel {
    pub name: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagsResponseBody {
    pub models: Vec<WireModel>,
}

impl TagsResponseBody {
    pub fn into_models(self) -> Vec<Model> {
        self.models
            .into_iter()
            .map(|model| Model::new(model.name, model.modified_at, model.size))
            .collect()
    }
}
