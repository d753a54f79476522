use reqwest::Url;
use serde_json::Value;
use snafu::{ResultExt, Snafu};

use super::{BoxFuture, SearchProvider, SearchResult};

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.duckduckgo.com/";

const MAX_RELATED_TOPICS: usize = 5;

#[derive(Debug, Snafu)]
enum SearchError {
    #[snafu(display("invalid search endpoint '{endpoint}'"))]
    InvalidEndpoint {
        stage: &'static str,
        endpoint: String,
        source: url::ParseError,
    },
    #[snafu(display("search request failed on `{stage}`, {source}"))]
    Request {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("search response is not JSON on `{stage}`, {source}"))]
    Decode {
        stage: &'static str,
        source: serde_json::Error,
    },
}

/// DuckDuckGo instant-answer lookups. No API key required.
pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    endpoint: String,
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl DuckDuckGoSearch {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoint(http, DEFAULT_SEARCH_ENDPOINT)
    }

    pub fn with_endpoint(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    fn search_url(&self, query: &str) -> Result<Url, SearchError> {
        Url::parse_with_params(
            &self.endpoint,
            [
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .context(InvalidEndpointSnafu {
            stage: "build-search-url",
            endpoint: self.endpoint.clone(),
        })
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = self.search_url(query)?;
        let response = self.http.get(url).send().await.context(RequestSnafu {
            stage: "send-search-request",
        })?;
        // The endpoint labels its JSON as javascript, so decode from text.
        let payload = response.text().await.context(RequestSnafu {
            stage: "read-search-response",
        })?;
        let json: Value = serde_json::from_str(&payload).context(DecodeSnafu {
            stage: "decode-search-response",
        })?;

        Ok(reduce_instant_answer(&json))
    }
}

impl SearchProvider for DuckDuckGoSearch {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Vec<SearchResult>> {
        Box::pin(async move {
            match self.fetch(query).await {
                Ok(results) => {
                    tracing::debug!(result_count = results.len(), "web search completed");
                    results
                }
                Err(error) => {
                    tracing::warn!(error = %error, "web search failed; continuing without results");
                    Vec::new()
                }
            }
        })
    }
}

/// Reduces a loosely-typed instant-answer payload to ordered results:
/// the abstract, up to five related topics, then the direct answer.
pub fn reduce_instant_answer(payload: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let (Some(snippet), Some(url)) = (
        non_empty_str(payload, "Abstract"),
        str_field(payload, "AbstractURL"),
    ) {
        let title = str_field(payload, "AbstractText").unwrap_or("Abstract");
        results.push(SearchResult::new(title, url, snippet));
    }

    if let Some(topics) = payload.get("RelatedTopics").and_then(Value::as_array) {
        // Grouped topics carry no `Text` of their own and are skipped.
        for topic in topics.iter().take(MAX_RELATED_TOPICS) {
            if let (Some(text), Some(url)) =
                (str_field(topic, "Text"), str_field(topic, "FirstURL"))
            {
                results.push(SearchResult::new(url, url, text));
            }
        }
    }

    if let (Some(answer), Some(url)) = (
        non_empty_str(payload, "Answer"),
        str_field(payload, "AnswerURL"),
    ) {
        results.push(SearchResult::new("Answer", url, answer));
    }

    results
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    str_field(value, key).filter(|text| !text.is_empty())
}
