//! # Orchestrator Configuration
//! Per-channel resilience policies plus the global assembly thresholds,
//! loaded from `config/orchestrator.json` with a built-in default seed on
//! any read/parse failure. Consumed once at construction time; nothing here
//! is hot-reloaded during a produce call.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::channel::Channel;

pub const DEFAULT_CONFIG_PATH: &str = "config/orchestrator.json";

fn default_failure_threshold() -> u32 {
    5
}
fn default_success_threshold() -> u32 {
    2
}
fn default_cooldown_secs() -> u64 {
    30
}
fn default_rate_limit() -> usize {
    30
}
fn default_rate_window_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_attempt_timeout_ms() -> u64 {
    10_000
}
fn default_review_threshold() -> f32 {
    0.5
}
fn default_top_sources_limit() -> usize {
    5
}

/// Resilience policy for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPolicy {
    /// Consecutive failures in CLOSED before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Trial successes in HALF_OPEN before the breaker closes.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Fail-fast period after the breaker opens.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Max outbound requests per rolling window.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
    /// Saturated window: wait for a slot (FIFO) vs reject immediately.
    #[serde(default = "default_true")]
    pub wait_for_slot: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Budget for a single upstream attempt.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            cooldown_secs: default_cooldown_secs(),
            rate_limit: default_rate_limit(),
            rate_window_secs: default_rate_window_secs(),
            wait_for_slot: true,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl ChannelPolicy {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Full orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub news: ChannelPolicy,
    #[serde(default)]
    pub search: ChannelPolicy,
    #[serde(default)]
    pub analysis: ChannelPolicy,
    #[serde(default = "deep_research_seed")]
    pub deep_research: ChannelPolicy,
    /// Composite credibility below this flags the card for review.
    #[serde(default = "default_review_threshold")]
    pub credibility_review_threshold: f32,
    #[serde(default = "default_top_sources_limit")]
    pub top_sources_limit: usize,
}

/// Deep research calls are long-running and expensive; slower cooldown and
/// a bigger per-attempt budget by default.
fn deep_research_seed() -> ChannelPolicy {
    ChannelPolicy {
        cooldown_secs: 60,
        attempt_timeout_ms: 60_000,
        rate_limit: 10,
        ..ChannelPolicy::default()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            news: ChannelPolicy::default(),
            search: ChannelPolicy::default(),
            analysis: ChannelPolicy::default(),
            deep_research: deep_research_seed(),
            credibility_review_threshold: default_review_threshold(),
            top_sources_limit: default_top_sources_limit(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from a JSON file; falls back to defaults on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "orchestrator config unparseable, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn policy(&self, channel: Channel) -> &ChannelPolicy {
        match channel {
            Channel::News => &self.news,
            Channel::Search => &self.search,
            Channel::Analysis => &self.analysis,
            Channel::DeepResearch => &self.deep_research,
        }
    }
}
