//! News channel: article-like sources for a subject + keyword set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelError, ChannelResult, SourceReference};
use crate::retry::RetryExecutor;

use super::{elapsed_ms, record_settle, settle_fallback};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsPayload {
    pub articles: Vec<NewsArticle>,
}

impl NewsPayload {
    pub fn empty() -> Self {
        Self { articles: Vec::new() }
    }
}

/// Low-level provider doing the actual upstream call. Separated so tests
/// can inject deterministic fakes under the same client.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch(&self, subject: &str, keywords: &[String]) -> Result<NewsPayload, ChannelError>;
    fn name(&self) -> &'static str;
}

/// HTTP provider: one authenticated JSON request per attempt.
pub struct HttpNewsProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpNewsProvider {
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

    /// Endpoint and key from `NEWS_API_URL` / `NEWS_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("NEWS_API_URL").unwrap_or_default(),
            std::env::var("NEWS_API_KEY").unwrap_or_default(),
        )
    }
}

#[async_trait]
impl NewsProvider for HttpNewsProvider {
    async fn fetch(&self, subject: &str, keywords: &[String]) -> Result<NewsPayload, ChannelError> {
        #[derive(Serialize)]
        struct Req<'a> {
            query: &'a str,
            keywords: &'a [String],
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Req {
                query: subject,
                keywords,
            })
            .send()
            .await
            .map_err(|e| ChannelError::upstream(Channel::News, e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::upstream(
                Channel::News,
                Some(status.as_u16()),
                "non-success status from news upstream",
            ));
        }

        resp.json::<NewsPayload>()
            .await
            .map_err(|e| ChannelError::parse(Channel::News, e.to_string()))
    }

    fn name(&self) -> &'static str {
        "http-news"
    }
}

/// News channel client: provider call wrapped in the retry executor,
/// settling to a real or fallback `ChannelResult`.
pub struct NewsClient {
    provider: Arc<dyn NewsProvider>,
    exec: RetryExecutor,
}

impl NewsClient {
    pub fn new(provider: Arc<dyn NewsProvider>, exec: RetryExecutor) -> Self {
        Self { provider, exec }
    }

    pub async fn fetch(&self, subject: &str, keywords: &[String]) -> ChannelResult {
        let start = Instant::now();
        let outcome = self
            .exec
            .execute(|| self.provider.fetch(subject, keywords))
            .await;

        match outcome {
            Ok(payload) => {
                let sources = payload
                    .articles
                    .iter()
                    .map(|a| SourceReference {
                        url: a.url.clone(),
                        title: a.title.clone(),
                        published_at: a.published_at,
                    })
                    .collect();
                let value = serde_json::to_value(&payload).unwrap_or_default();
                let result = ChannelResult::ok(Channel::News, value, sources, elapsed_ms(start));
                record_settle(Channel::News, &result);
                result
            }
            Err(err) => {
                let empty = serde_json::to_value(NewsPayload::empty()).unwrap_or_default();
                settle_fallback(Channel::News, empty, &err, start)
            }
        }
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.exec
    }
}
