//! Deep-research channel: long-form report plus a citation list. No input
//! dependency on other channels; runs concurrently with analysis.
//!
//! Upstreams emit citations in two shapes (bare URL string or object);
//! both are normalized here. A citation in neither shape is dropped with a
//! warning so ambiguity never reaches the credibility scorer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelError, ChannelResult, SourceReference};
use crate::retry::RetryExecutor;

use super::{elapsed_ms, record_settle, settle_fallback};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPayload {
    pub report: String,
    /// Raw citation values as the upstream sent them.
    #[serde(default)]
    pub citations: Vec<serde_json::Value>,
}

impl ResearchPayload {
    pub fn empty() -> Self {
        Self {
            report: String::new(),
            citations: Vec::new(),
        }
    }
}

#[async_trait]
pub trait ResearchProvider: Send + Sync {
    async fn research(&self, subject: &str) -> Result<ResearchPayload, ChannelError>;
    fn name(&self) -> &'static str;
}

pub struct HttpResearchProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpResearchProvider {
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

    /// Endpoint and key from `RESEARCH_API_URL` / `RESEARCH_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("RESEARCH_API_URL").unwrap_or_default(),
            std::env::var("RESEARCH_API_KEY").unwrap_or_default(),
        )
    }
}

#[async_trait]
impl ResearchProvider for HttpResearchProvider {
    async fn research(&self, subject: &str) -> Result<ResearchPayload, ChannelError> {
        #[derive(Serialize)]
        struct Req<'a> {
            subject: &'a str,
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Req { subject })
            .send()
            .await
            .map_err(|e| {
                ChannelError::upstream(
                    Channel::DeepResearch,
                    e.status().map(|s| s.as_u16()),
                    e.to_string(),
                )
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::upstream(
                Channel::DeepResearch,
                Some(status.as_u16()),
                "non-success status from research upstream",
            ));
        }

        resp.json::<ResearchPayload>()
            .await
            .map_err(|e| ChannelError::parse(Channel::DeepResearch, e.to_string()))
    }

    fn name(&self) -> &'static str {
        "http-research"
    }
}

pub struct DeepResearchClient {
    provider: Arc<dyn ResearchProvider>,
    exec: RetryExecutor,
}

impl DeepResearchClient {
    pub fn new(provider: Arc<dyn ResearchProvider>, exec: RetryExecutor) -> Self {
        Self { provider, exec }
    }

    pub async fn fetch(&self, subject: &str) -> ChannelResult {
        let start = Instant::now();
        let outcome = self.exec.execute(|| self.provider.research(subject)).await;

        match outcome {
            Ok(payload) => {
                let sources = normalize_citations(&payload.citations);
                let value = serde_json::to_value(&payload).unwrap_or_default();
                let result =
                    ChannelResult::ok(Channel::DeepResearch, value, sources, elapsed_ms(start));
                record_settle(Channel::DeepResearch, &result);
                result
            }
            Err(err) => {
                let empty = serde_json::to_value(ResearchPayload::empty()).unwrap_or_default();
                settle_fallback(Channel::DeepResearch, empty, &err, start)
            }
        }
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.exec
    }
}

/// Normalize both citation shapes; drop anything unrecognized.
fn normalize_citations(citations: &[serde_json::Value]) -> Vec<SourceReference> {
    let mut out = Vec::with_capacity(citations.len());
    for c in citations {
        match SourceReference::from_value(Channel::DeepResearch, c) {
            Ok(s) => out.push(s),
            Err(e) => {
                tracing::warn!(error = %e, "dropping unrecognized citation shape");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixed_citation_shapes_normalize() {
        let cites = vec![
            json!("https://example.com/a"),
            json!({"url": "https://example.com/b", "title": "B"}),
            json!(12345),
        ];
        let out = normalize_citations(&cites);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].title, "B");
    }
}
