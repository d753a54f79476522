//! Client side of the Ollama HTTP API: model listing, chat turns and
//! single-shot generation, plus the provider seam the chat session talks to.

mod model;
mod ollama;
mod provider;
#[cfg(test)]
mod test_support;
pub mod wire;

pub use model::{FALLBACK_MODEL, Model, ModelCatalog};
pub use ollama::{OLLAMA_PROVIDER_NAME, OllamaClient};
pub use provider::{
    BoxFuture, ChatProvider, ChatRequest, DEFAULT_BASE_URL, DEFAULT_SYSTEM_PROMPT,
    ProviderConfig, ProviderError, ProviderErrorKind, ProviderMessage, ProviderResult, Role,
    SharedProviderConfig, shared_config,
};
