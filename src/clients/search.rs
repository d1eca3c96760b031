//! Search channel: contextual snippet sources for a subject.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelError, ChannelResult, SourceReference};
use crate::retry::RetryExecutor;

use super::{elapsed_ms, record_settle, settle_fallback};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPayload {
    pub snippets: Vec<SearchSnippet>,
}

impl SearchPayload {
    pub fn empty() -> Self {
        Self { snippets: Vec::new() }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, subject: &str) -> Result<SearchPayload, ChannelError>;
    fn name(&self) -> &'static str;
}

pub struct HttpSearchProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSearchProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("impact-orchestrator/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Endpoint and key from `SEARCH_API_URL` / `SEARCH_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("SEARCH_API_URL").unwrap_or_default(),
            std::env::var("SEARCH_API_KEY").unwrap_or_default(),
        )
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, subject: &str) -> Result<SearchPayload, ChannelError> {
        #[derive(Serialize)]
        struct Req<'a> {
            query: &'a str,
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Req { query: subject })
            .send()
            .await
            .map_err(|e| {
                ChannelError::upstream(Channel::Search, e.status().map(|s| s.as_u16()), e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::upstream(
                Channel::Search,
                Some(status.as_u16()),
                "non-success status from search upstream",
            ));
        }

        resp.json::<SearchPayload>()
            .await
            .map_err(|e| ChannelError::parse(Channel::Search, e.to_string()))
    }

    fn name(&self) -> &'static str {
        "http-search"
    }
}

pub struct SearchClient {
    provider: Arc<dyn SearchProvider>,
    exec: RetryExecutor,
}

impl SearchClient {
    pub fn new(provider: Arc<dyn SearchProvider>, exec: RetryExecutor) -> Self {
        Self { provider, exec }
    }

    pub async fn fetch(&self, subject: &str) -> ChannelResult {
        let start = Instant::now();
        let outcome = self.exec.execute(|| self.provider.search(subject)).await;

        match outcome {
            Ok(payload) => {
                let sources = payload
                    .snippets
                    .iter()
                    .map(|s| SourceReference::new(s.url.clone(), s.title.clone()))
                    .collect();
                let value = serde_json::to_value(&payload).unwrap_or_default();
                let result = ChannelResult::ok(Channel::Search, value, sources, elapsed_ms(start));
                record_settle(Channel::Search, &result);
                result
            }
            Err(err) => {
                let empty = serde_json::to_value(SearchPayload::empty()).unwrap_or_default();
                settle_fallback(Channel::Search, empty, &err, start)
            }
        }
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.exec
    }
}
