//! # Channels
//! Core vocabulary shared by the whole pipeline: the four logical upstream
//! channels, the error taxonomy for a single channel attempt, and the
//! per-channel result record the orchestrator aggregates.
//!
//! Citation shapes from upstreams are noisy (sometimes a bare URL string,
//! sometimes an object); `SourceReference::from_value` normalizes both at
//! the channel-client boundary so nothing downstream has to guess.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One logical upstream capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    News,
    Search,
    Analysis,
    DeepResearch,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::News,
        Channel::Search,
        Channel::Analysis,
        Channel::DeepResearch,
    ];

    /// Stable name used in logs, metrics labels, and progress events.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::News => "news",
            Channel::Search => "search",
            Channel::Analysis => "analysis",
            Channel::DeepResearch => "deep_research",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of an upstream failure, consumed by the retry decision
/// table instead of being inferred from error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, 5xx, 429, transient transport error. Worth another attempt.
    Retryable,
    /// 4xx (other than 429), contract violation. Retrying cannot help.
    Fatal,
}

/// Classify an upstream HTTP status for the retry decision table.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::Retryable,
        s if s >= 500 => ErrorKind::Retryable,
        _ => ErrorKind::Fatal,
    }
}

/// Errors produced below the `produce` boundary. All of them carry the
/// channel identity so callers never re-derive it from message text.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The channel's breaker is failing fast; no upstream call was attempted.
    #[error("{channel}: circuit open, failing fast")]
    CircuitOpen { channel: Channel },

    /// Local admission control rejected the call.
    #[error("{channel}: rate limited")]
    RateLimited { channel: Channel },

    /// The upstream responded with an error or the transport failed.
    #[error("{channel}: upstream error (status {status:?}): {message}")]
    Upstream {
        channel: Channel,
        status: Option<u16>,
        message: String,
        kind: ErrorKind,
    },

    /// The upstream responded but the payload did not match the expected
    /// shape. Always fatal: malformed output is a contract violation, not a
    /// transient failure.
    #[error("{channel}: unparseable response: {message}")]
    Parse { channel: Channel, message: String },

    /// Caller-supplied input is malformed. The only class that aborts
    /// `produce` instead of degrading.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ChannelError {
    pub fn upstream(channel: Channel, status: Option<u16>, message: impl Into<String>) -> Self {
        let kind = match status {
            Some(s) => classify_status(s),
            // No status means the transport failed before a response arrived.
            None => ErrorKind::Retryable,
        };
        ChannelError::Upstream {
            channel,
            status,
            message: message.into(),
            kind,
        }
    }

    pub fn timeout(channel: Channel) -> Self {
        ChannelError::Upstream {
            channel,
            status: None,
            message: "attempt timed out".to_string(),
            kind: ErrorKind::Retryable,
        }
    }

    pub fn parse(channel: Channel, message: impl Into<String>) -> Self {
        ChannelError::Parse {
            channel,
            message: message.into(),
        }
    }

    /// Channel this error is tagged with, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ChannelError::CircuitOpen { channel }
            | ChannelError::RateLimited { channel }
            | ChannelError::Upstream { channel, .. }
            | ChannelError::Parse { channel, .. } => Some(*channel),
            ChannelError::InvalidInput(_) => None,
        }
    }

    /// Whether the retry executor may attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChannelError::Upstream {
                kind: ErrorKind::Retryable,
                ..
            }
        )
    }

    /// Whether the attempt reached the upstream at all. Breaker accounting
    /// only records outcomes of real attempts.
    pub fn reached_upstream(&self) -> bool {
        matches!(
            self,
            ChannelError::Upstream { .. } | ChannelError::Parse { .. }
        )
    }
}

/// One reference to an external source, immutable once produced by a
/// channel client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl SourceReference {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            published_at: None,
        }
    }

    /// Normalize the two citation shapes upstreams emit: a bare URL string,
    /// or an object with `url` and optional `title`/`published_at`.
    /// Unrecognized shapes are rejected here rather than propagated.
    pub fn from_value(channel: Channel, value: &serde_json::Value) -> Result<Self, ChannelError> {
        match value {
            serde_json::Value::String(url) if !url.trim().is_empty() => {
                Ok(SourceReference::new(url.trim(), url.trim()))
            }
            serde_json::Value::Object(map) => {
                let url = map
                    .get("url")
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ChannelError::parse(channel, "citation object without url field")
                    })?;
                let title = map
                    .get("title")
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(url);
                let published_at = map
                    .get("published_at")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                Ok(SourceReference {
                    url: url.to_string(),
                    title: title.to_string(),
                    published_at,
                })
            }
            other => Err(ChannelError::parse(
                channel,
                format!("unrecognized citation shape: {other}"),
            )),
        }
    }
}

/// Settled outcome of one channel within one orchestration call.
/// Never mutated after the channel settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: Channel,
    pub payload: serde_json::Value,
    pub sources: Vec<SourceReference>,
    pub degraded: bool,
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl ChannelResult {
    pub fn ok(
        channel: Channel,
        payload: serde_json::Value,
        sources: Vec<SourceReference>,
        latency_ms: u64,
    ) -> Self {
        Self {
            channel,
            payload,
            sources,
            degraded: false,
            error: None,
            latency_ms,
        }
    }

    /// Minimal safe fallback: empty sources, the triggering error recorded
    /// for diagnostics.
    pub fn fallback(
        channel: Channel,
        payload: serde_json::Value,
        error: &ChannelError,
        latency_ms: u64,
    ) -> Self {
        Self {
            channel,
            payload,
            sources: Vec::new(),
            degraded: true,
            error: Some(error.to_string()),
            latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_classification_table() {
        assert_eq!(classify_status(500), ErrorKind::Retryable);
        assert_eq!(classify_status(503), ErrorKind::Retryable);
        assert_eq!(classify_status(429), ErrorKind::Retryable);
        assert_eq!(classify_status(400), ErrorKind::Fatal);
        assert_eq!(classify_status(404), ErrorKind::Fatal);
        assert_eq!(classify_status(422), ErrorKind::Fatal);
    }

    #[test]
    fn citation_from_bare_string() {
        let v = json!("https://example.com/a");
        let s = SourceReference::from_value(Channel::DeepResearch, &v).unwrap();
        assert_eq!(s.url, "https://example.com/a");
        assert_eq!(s.title, s.url);
        assert!(s.published_at.is_none());
    }

    #[test]
    fn citation_from_object() {
        let v = json!({
            "url": "https://example.com/b",
            "title": "Report",
            "published_at": "2025-06-01T12:00:00Z"
        });
        let s = SourceReference::from_value(Channel::News, &v).unwrap();
        assert_eq!(s.title, "Report");
        assert!(s.published_at.is_some());
    }

    #[test]
    fn citation_rejects_unknown_shapes() {
        for v in [json!(42), json!(["x"]), json!(""), json!({"title": "no url"})] {
            assert!(SourceReference::from_value(Channel::News, &v).is_err());
        }
    }

    #[test]
    fn parse_errors_are_never_retryable() {
        let e = ChannelError::parse(Channel::Analysis, "bad shape");
        assert!(!e.is_retryable());
        assert!(e.reached_upstream());
        assert_eq!(e.channel(), Some(Channel::Analysis));
    }
}
