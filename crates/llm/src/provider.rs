use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Default address of the Ollama server when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://192.168.1.100:11434";

/// Default system prompt offered to single-turn generation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Connection settings read by the client at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub system_prompt: String,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().to_string(),
            system_prompt: system_prompt.into(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_SYSTEM_PROMPT)
    }
}

/// Live configuration handle shared between the settings store and the client.
pub type SharedProviderConfig = Arc<ArcSwap<ProviderConfig>>;

pub fn shared_config(config: ProviderConfig) -> SharedProviderConfig {
    Arc::new(ArcSwap::from_pointee(config))
}

/// Chat speaker role as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One chat turn handed to a provider, images still as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
    pub images: Vec<Vec<u8>>,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<Vec<u8>>) -> Self {
        self.images = images;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ProviderMessage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ProviderMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("invalid Ollama URL '{endpoint}'"))]
    InvalidEndpoint {
        stage: &'static str,
        endpoint: String,
        source: url::ParseError,
    },
    #[snafu(display("cannot reach Ollama at {endpoint}: {source}"))]
    Connectivity {
        stage: &'static str,
        endpoint: String,
        #[snafu(source(from(ProviderError, Box::new)))]
        source: Box<ProviderError>,
    },
    #[snafu(display("request to Ollama failed on `{stage}`, {source}"))]
    RequestFailed {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to Ollama failed with status {status}"))]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode Ollama response on `{stage}`, {source}"))]
    DecodeFailed {
        stage: &'static str,
        source: serde_json::Error,
    },
}

/// Coarse failure classes surfaced to callers that do not care about transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    Connectivity,
    InvalidEndpoint,
    RequestFailed,
    DecodeFailed,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::InvalidEndpoint { .. } => ProviderErrorKind::InvalidEndpoint,
            Self::Connectivity { .. } => ProviderErrorKind::Connectivity,
            Self::RequestFailed { .. } | Self::UnexpectedStatus { .. } => {
                ProviderErrorKind::RequestFailed
            }
            Self::DecodeFailed { .. } => ProviderErrorKind::DecodeFailed,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint { stage, .. }
            | Self::Connectivity { stage, .. }
            | Self::RequestFailed { stage, .. }
            | Self::UnexpectedStatus { stage, .. }
            | Self::DecodeFailed { stage, .. } => stage,
        }
    }
}

/// Chat seam between the orchestrator and an inference backend.
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Model the next chat request should target.
    fn active_model(&self) -> String;
    fn chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ProviderResult<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_transport_failures_share_the_request_failed_kind() {
        let status = ProviderError::UnexpectedStatus {
            stage: "chat-http-status",
            status: 500,
            body: String::new(),
        };
        assert_eq!(status.kind(), ProviderErrorKind::RequestFailed);
        assert_eq!(status.stage(), "chat-http-status");
        assert_eq!(status.to_string(), "request to Ollama failed with status 500");
    }

    #[test]
    fn connectivity_wraps_the_underlying_failure() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ProviderError::Connectivity {
            stage: "list-models",
            endpoint: "http://localhost:11434".to_string(),
            source: Box::new(ProviderError::DecodeFailed {
                stage: "decode-model-list",
                source: decode,
            }),
        };

        assert_eq!(error.kind(), ProviderErrorKind::Connectivity);
        assert!(error.to_string().starts_with("cannot reach Ollama at http://localhost:11434"));
    }

    #[test]
    fn config_trims_base_url() {
        let config = ProviderConfig::new("  http://localhost:11434 ", "be brief");
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.system_prompt, "be brief");
    }
}
