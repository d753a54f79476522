//! Web search used to ground chat answers in fresh context.

mod duckduckgo;
#[cfg(test)]
mod test_support;

use std::future::Future;
use std::pin::Pin;

pub use duckduckgo::{DEFAULT_SEARCH_ENDPOINT, DuckDuckGoSearch, reduce_instant_answer};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// Search seam consumed by the chat session.
///
/// Implementations never fail: an unreachable or malformed backend yields no results.
pub trait SearchProvider: Send + Sync {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Vec<SearchResult>>;
}
