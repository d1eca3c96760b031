//! # Impact Card
//! The composite artifact assembled from all four channels, plus the
//! structured risk assessment parsed from the analysis channel. Created
//! once per orchestration call, immutable after assembly; persistence is
//! the caller's responsibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::credibility::{ScoredSource, TierHistogram};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
    /// Fallback when the analysis channel degraded.
    Unknown,
}

/// One categorized impact area from the analysis channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactArea {
    pub category: String,
    pub summary: String,
}

/// Structured output of the analysis channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 0..=100.
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    /// 0..=100.
    pub confidence: u8,
    #[serde(default)]
    pub impact_areas: Vec<ImpactArea>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
}

impl RiskAssessment {
    /// Synthetic neutral assessment used when the analysis channel degrades:
    /// mid-scale risk, zero confidence, nothing fabricated.
    pub fn neutral_fallback() -> Self {
        Self {
            risk_score: 50,
            risk_level: RiskLevel::Unknown,
            confidence: 0,
            impact_areas: Vec::new(),
            key_insights: Vec::new(),
            recommended_actions: Vec::new(),
        }
    }

    /// Clamp out-of-range upstream numbers instead of failing the parse.
    pub fn sanitized(mut self) -> Self {
        self.risk_score = self.risk_score.min(100);
        self.confidence = self.confidence.min(100);
        self
    }
}

/// Per-channel diagnostics returned alongside the card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDiagnostics {
    pub channel: Channel,
    pub degraded: bool,
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// Per-channel source counts plus the credibility breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBreakdown {
    pub total: usize,
    pub news: usize,
    pub search: usize,
    pub analysis: usize,
    pub deep_research: usize,
    pub tiers: TierHistogram,
    pub top_sources: Vec<ScoredSource>,
}

/// The composite artifact of one orchestration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactCard {
    pub subject: String,
    pub keywords: Vec<String>,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub confidence: u8,
    /// Composite credibility in `[0, 1]`.
    pub credibility: f32,
    /// Set when credibility falls below the review threshold or more than
    /// one channel degraded.
    pub requires_review: bool,
    pub impact_areas: Vec<ImpactArea>,
    pub key_insights: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub sources: SourceBreakdown,
    pub diagnostics: Vec<ChannelDiagnostics>,
    pub processing_ms: u64,
    pub generated_at: DateTime<Utc>,
}

impl ImpactCard {
    pub fn degraded_channels(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.degraded).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_fallback_is_mid_scale() {
        let r = RiskAssessment::neutral_fallback();
        assert_eq!(r.risk_score, 50);
        assert_eq!(r.risk_level, RiskLevel::Unknown);
        assert_eq!(r.confidence, 0);
        assert!(r.key_insights.is_empty());
    }

    #[test]
    fn sanitize_clamps_out_of_range_scores() {
        let r = RiskAssessment {
            risk_score: 250,
            confidence: 130,
            ..RiskAssessment::neutral_fallback()
        }
        .sanitized();
        assert_eq!(r.risk_score, 100);
        assert_eq!(r.confidence, 100);
    }

    #[test]
    fn risk_assessment_parses_from_upstream_json() {
        let r: RiskAssessment = serde_json::from_str(
            r#"{
                "risk_score": 72,
                "risk_level": "high",
                "confidence": 85,
                "impact_areas": [{"category": "regulatory", "summary": "new filing"}],
                "key_insights": ["exposure rising"],
                "recommended_actions": ["review supplier contracts"]
            }"#,
        )
        .unwrap();
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.impact_areas.len(), 1);
    }
}
