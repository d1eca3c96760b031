//! Analysis channel: LLM-based impact assessment fed with the news and
//! search results (even when those are degraded fallbacks).
//!
//! The upstream is a chat-completions style API; the model is instructed to
//! answer with a single JSON object. A response that does not parse into
//! `RiskAssessment` is a contract violation, not a transient failure: it is
//! surfaced as a fatal parse error and never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::RiskAssessment;
use crate::channel::{Channel, ChannelError, ChannelResult};
use crate::retry::RetryExecutor;

use super::{elapsed_ms, record_settle, settle_fallback};

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn assess(
        &self,
        subject: &str,
        news: &serde_json::Value,
        search: &serde_json::Value,
    ) -> Result<RiskAssessment, ChannelError>;
    fn name(&self) -> &'static str;
}

pub struct HttpAnalysisProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpAnalysisProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model_override: Option<&str>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("impact-orchestrator/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }

    /// Endpoint and key from `ANALYSIS_API_URL` / `ANALYSIS_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("ANALYSIS_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            std::env::var("ANALYSIS_API_KEY").unwrap_or_default(),
            None,
        )
    }
}

#[async_trait]
impl AnalysisProvider for HttpAnalysisProvider {
    async fn assess(
        &self,
        subject: &str,
        news: &serde_json::Value,
        search: &serde_json::Value,
    ) -> Result<RiskAssessment, ChannelError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let sys = "You assess business impact for a subject from provided evidence. \
                   Respond with ONE JSON object only: {\"risk_score\": 0-100, \
                   \"risk_level\": \"low|moderate|high|critical\", \"confidence\": 0-100, \
                   \"impact_areas\": [{\"category\": str, \"summary\": str}], \
                   \"key_insights\": [str], \"recommended_actions\": [str]}.";
        let user = format!(
            "Subject: {subject}\nNews evidence: {news}\nSearch evidence: {search}"
        );
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: sys,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                ChannelError::upstream(Channel::Analysis, e.status().map(|s| s.as_u16()), e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::upstream(
                Channel::Analysis,
                Some(status.as_u16()),
                "non-success status from analysis upstream",
            ));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ChannelError::parse(Channel::Analysis, e.to_string()))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");

        parse_assessment(content)
    }

    fn name(&self) -> &'static str {
        "http-analysis"
    }
}

/// Parse the model's answer into a `RiskAssessment`. Tolerates code fences
/// around the object; anything else is a fatal parse error.
pub fn parse_assessment(content: &str) -> Result<RiskAssessment, ChannelError> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str::<RiskAssessment>(stripped)
        .map(RiskAssessment::sanitized)
        .map_err(|e| ChannelError::parse(Channel::Analysis, e.to_string()))
}

pub struct AnalysisClient {
    provider: Arc<dyn AnalysisProvider>,
    exec: RetryExecutor,
}

impl AnalysisClient {
    pub fn new(provider: Arc<dyn AnalysisProvider>, exec: RetryExecutor) -> Self {
        Self { provider, exec }
    }

    /// Run the assessment over the settled news and search payloads.
    /// Returns the channel result plus the assessment the card is built
    /// from (neutral fallback when degraded).
    pub async fn analyze(
        &self,
        subject: &str,
        news: &ChannelResult,
        search: &ChannelResult,
    ) -> (ChannelResult, RiskAssessment) {
        let start = Instant::now();
        let outcome = self
            .exec
            .execute(|| self.provider.assess(subject, &news.payload, &search.payload))
            .await;

        match outcome {
            Ok(assessment) => {
                let value = serde_json::to_value(&assessment).unwrap_or_default();
                let result =
                    ChannelResult::ok(Channel::Analysis, value, Vec::new(), elapsed_ms(start));
                record_settle(Channel::Analysis, &result);
                (result, assessment)
            }
            Err(err) => {
                let fallback = RiskAssessment::neutral_fallback();
                let value = serde_json::to_value(&fallback).unwrap_or_default();
                let result = settle_fallback(Channel::Analysis, value, &err, start);
                (result, fallback)
            }
        }
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.exec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::RiskLevel;

    #[test]
    fn parses_plain_json_answer() {
        let a = parse_assessment(
            r#"{"risk_score": 72, "risk_level": "high", "confidence": 85}"#,
        )
        .unwrap();
        assert_eq!(a.risk_score, 72);
        assert_eq!(a.risk_level, RiskLevel::High);
    }

    #[test]
    fn parses_fenced_answer() {
        let a = parse_assessment(
            "```json\n{\"risk_score\": 10, \"risk_level\": \"low\", \"confidence\": 40}\n```",
        )
        .unwrap();
        assert_eq!(a.risk_level, RiskLevel::Low);
    }

    #[test]
    fn prose_answer_is_a_fatal_parse_error() {
        let err = parse_assessment("The risk seems moderate overall.").unwrap_err();
        assert!(matches!(err, ChannelError::Parse { channel: Channel::Analysis, .. }));
        assert!(!err.is_retryable());
    }
}
