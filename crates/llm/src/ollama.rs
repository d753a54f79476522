use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, ensure};

use super::model::{Model, ModelCatalog};
use super::provider::{
    BoxFuture, ChatProvider, ChatRequest, ConnectivitySnafu, DecodeFailedSnafu,
    InvalidEndpointSnafu, ProviderResult, RequestFailedSnafu, SharedProviderConfig,
    UnexpectedStatusSnafu,
};
use super::wire::{
    ChatRequestBody, ChatResponseBody, GenerateRequestBody, GenerateResponseBody,
    TagsResponseBody,
};

pub const OLLAMA_PROVIDER_NAME: &str = "Ollama";

const TAGS_PATH: &str = "/api/tags";
const CHAT_PATH: &str = "/api/chat";
const GENERATE_PATH: &str = "/api/generate";

/// Stage labels for the three steps of reading a JSON response.
struct ResponseStages {
    status: &'static str,
    read: &'static str,
    decode: &'static str,
}

/// Clears the loading flag when the request future finishes or is dropped.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// HTTP client for an Ollama server.
///
/// The base URL is read from the shared config on every call, so settings
/// edits apply to the next request without rebuilding the client.
pub struct OllamaClient {
    http: reqwest::Client,
    config: SharedProviderConfig,
    catalog: ArcSwap<ModelCatalog>,
    loading: AtomicBool,
}

impl OllamaClient {
    pub fn new(config: SharedProviderConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    pub fn with_http_client(config: SharedProviderConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config,
            catalog: ArcSwap::from_pointee(ModelCatalog::default()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> Arc<ModelCatalog> {
        self.catalog.load_full()
    }

    pub fn is_connected(&self) -> bool {
        self.catalog.load().connected
    }

    /// True while a chat request is on the wire.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn select_model(&self, name: &str) {
        self.catalog.rcu(|catalog| catalog.with_selected(name));
        tracing::info!(model = %name, "selected model");
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        let base_url = self.config.load().base_url.clone();
        let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
        Url::parse(&raw).context(InvalidEndpointSnafu {
            stage: "build-endpoint-url",
            endpoint: base_url,
        })
    }

    /// Fetches the served models and swaps them into the catalog.
    ///
    /// On failure the catalog keeps its previous models and is marked disconnected.
    pub async fn list_models(&self) -> ProviderResult<Vec<Model>> {
        let base_url = self.config.load().base_url.clone();

        match self.fetch_models().await {
            Ok(models) => {
                self.catalog.rcu(|catalog| catalog.with_refreshed(models.clone()));
                tracing::info!(
                    endpoint = %base_url,
                    model_count = models.len(),
                    "refreshed model list"
                );
                Ok(models)
            }
            Err(error) => {
                self.catalog.rcu(|catalog| catalog.disconnected());
                tracing::warn!(
                    endpoint = %base_url,
                    error = %error,
                    "failed to load models; keeping previous list"
                );
                Err(error).context(ConnectivitySnafu {
                    stage: "list-models",
                    endpoint: base_url,
                })
            }
        }
    }

    async fn fetch_models(&self) -> ProviderResult<Vec<Model>> {
        let url = self.endpoint(TAGS_PATH)?;
        let response = self.http.get(url).send().await.context(RequestFailedSnafu {
            stage: "send-model-request",
        })?;

        let body: TagsResponseBody = Self::read_json(
            response,
            ResponseStages {
                status: "model-http-status",
                read: "read-model-response",
                decode: "decode-model-response",
            },
        )
        .await?;

        Ok(body.into_models())
    }

    /// Sends a whole conversation and returns the assistant's reply text.
    pub async fn chat_completion(&self, request: ChatRequest) -> ProviderResult<String> {
        let _loading = LoadingGuard::enter(&self.loading);
        let url = self.endpoint(CHAT_PATH)?;
        let body = ChatRequestBody::from(&request);

        tracing::debug!(
            model = %request.model,
            message_count = body.messages.len(),
            image_count = body.messages.iter().map(|message| message.images.len()).sum::<usize>(),
            "sending chat request"
        );

        let reply: ChatResponseBody = self
            .post_json(
                url,
                &body,
                "send-chat-request",
                ResponseStages {
                    status: "chat-http-status",
                    read: "read-chat-response",
                    decode: "decode-chat-response",
                },
            )
            .await?;

        Ok(reply.message.content)
    }

    /// Single-turn completion, independent of any conversation history.
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> ProviderResult<String> {
        let url = self.endpoint(GENERATE_PATH)?;
        let body = GenerateRequestBody {
            model: self.active_model(),
            prompt: prompt.to_string(),
            system: system_prompt
                .map(str::trim)
                .filter(|system| !system.is_empty())
                .map(str::to_string),
            stream: false,
        };

        let reply: GenerateResponseBody = self
            .post_json(
                url,
                &body,
                "send-generate-request",
                ResponseStages {
                    status: "generate-http-status",
                    read: "read-generate-response",
                    decode: "decode-generate-response",
                },
            )
            .await?;

        Ok(reply.response)
    }

    async fn post_json<B, R>(
        &self,
        url: Url,
        body: &B,
        send_stage: &'static str,
        stages: ResponseStages,
    ) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .context(RequestFailedSnafu { stage: send_stage })?;

        Self::read_json(response, stages).await
    }

    async fn read_json<R>(response: reqwest::Response, stages: ResponseStages) -> ProviderResult<R>
    where
        R: DeserializeOwned,
    {
        let status = response.status();
        let payload = response.text().await.context(RequestFailedSnafu {
            stage: stages.read,
        })?;

        ensure!(
            status == StatusCode::OK,
            UnexpectedStatusSnafu {
                stage: stages.status,
                status: status.as_u16(),
                body: payload,
            }
        );

        serde_json::from_str(&payload).context(DecodeFailedSnafu {
            stage: stages.decode,
        })
    }
}

impl ChatProvider for OllamaClient {
    fn name(&self) -> &str {
        OLLAMA_PROVIDER_NAME
    }

    fn active_model(&self) -> String {
        self.catalog.load().active_model()
    }

    fn chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(self.chat_completion(request))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::provider::{ProviderConfig, ProviderErrorKind, ProviderMessage, Role, shared_config};
    use crate::test_support::serve_once;

    fn client_for(base_url: &str) -> OllamaClient {
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("build test http client");
        OllamaClient::with_http_client(
            shared_config(ProviderConfig::new(base_url, "You are terse.")),
            http,
        )
    }

    #[tokio::test]
    async fn list_models_selects_first_model_and_marks_connected() {
        let (base_url, captured) = serve_once(
            200,
            r#"{"models":[{"name":"llama3:8b","modified_at":"2024-05-01T10:00:00Z","size":42},{"name":"llava:7b","modified_at":"2024-04-11T08:30:00Z","size":7}]}"#,
        )
        .await;
        let client = client_for(&base_url);

        let models = client.list_models().await.expect("models listed");

        assert_eq!(models.len(), 2);
        assert!(client.is_connected());
        assert_eq!(client.active_model(), "llama3:8b");
        let request = captured.await.expect("request captured");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/api/tags");
    }

    #[tokio::test]
    async fn failed_listing_keeps_previous_models() {
        let (base_url, _captured) = serve_once(200, r#"{"models":[{"name":"llama3:8b"}]}"#).await;
        let client = client_for(&base_url);
        client.list_models().await.expect("first listing succeeds");

        let (broken_url, _captured) = serve_once(200, "not json").await;
        client
            .config
            .store(Arc::new(ProviderConfig::new(broken_url, "You are terse.")));

        let error = client.list_models().await.expect_err("listing fails");

        assert_eq!(error.kind(), ProviderErrorKind::Connectivity);
        assert!(!client.is_connected());
        assert_eq!(client.catalog().models.len(), 1);
        assert_eq!(client.active_model(), "llama3:8b");
    }

    #[tokio::test]
    async fn chat_posts_non_streaming_history_and_returns_reply() {
        let (base_url, captured) = serve_once(
            200,
            r#"{"message":{"role":"assistant","content":"Hi there"},"done":true}"#,
        )
        .await;
        let client = client_for(&base_url);
        client.select_model("llava:7b");

        let request = ChatRequest::new(
            client.active_model(),
            vec![ProviderMessage::new(Role::User, "Hello").with_images(vec![vec![0xff, 0xd8]])],
        );
        let reply = client.chat(request).await.expect("chat reply");

        assert_eq!(reply, "Hi there");
        assert!(!client.is_loading());
        let request = captured.await.expect("request captured");
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/chat");
        let body: Value = serde_json::from_str(&request.body).expect("json body");
        assert_eq!(
            body,
            json!({
                "model": "llava:7b",
                "messages": [{"role": "user", "content": "Hello", "images": ["data:image/jpeg;base64,/9g="]}],
                "stream": false,
            })
        );
    }

    #[tokio::test]
    async fn chat_rejects_non_ok_status() {
        let (base_url, _captured) = serve_once(500, r#"{"error":"model not found"}"#).await;
        let client = client_for(&base_url);

        let error = client
            .chat(ChatRequest::new("missing", vec![ProviderMessage::new(Role::User, "hi")]))
            .await
            .expect_err("status rejected");

        assert_eq!(error.kind(), ProviderErrorKind::RequestFailed);
        assert_eq!(error.stage(), "chat-http-status");
        assert!(!client.is_loading());
    }

    #[tokio::test]
    async fn chat_reports_decode_failures() {
        let (base_url, _captured) = serve_once(200, r#"{"response":"wrong endpoint"}"#).await;
        let client = client_for(&base_url);

        let error = client
            .chat(ChatRequest::new("llama3", vec![ProviderMessage::new(Role::User, "hi")]))
            .await
            .expect_err("decode rejected");

        assert_eq!(error.kind(), ProviderErrorKind::DecodeFailed);
    }

    #[tokio::test]
    async fn malformed_base_url_is_an_invalid_endpoint() {
        let client = client_for("not a url");

        let error = client
            .chat(ChatRequest::new("llama3", vec![ProviderMessage::new(Role::User, "hi")]))
            .await
            .expect_err("invalid endpoint");

        assert_eq!(error.kind(), ProviderErrorKind::InvalidEndpoint);
        assert!(!client.is_loading());
    }

    #[tokio::test]
    async fn generate_sends_prompt_with_system_prompt() {
        let (base_url, captured) = serve_once(200, r#"{"response":"42","done":true}"#).await;
        let client = client_for(&base_url);

        let text = client
            .generate("meaning of life?", Some("You are terse."))
            .await
            .expect("generated");

        assert_eq!(text, "42");
        let request = captured.await.expect("request captured");
        assert_eq!(request.path, "/api/generate");
        let body: Value = serde_json::from_str(&request.body).expect("json body");
        assert_eq!(
            body,
            json!({
                "model": "llama2",
                "prompt": "meaning of life?",
                "system": "You are terse.",
                "stream": false,
            })
        );
    }
}
