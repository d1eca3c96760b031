// tests/orchestrator_faults.rs
//
// Fault-injection matrix: every combination of per-channel failure must
// still yield a well-formed impact card with matching degraded flags.
// Also covers the analysis parse-error contract and the all-channels-down
// fallback values.

use std::sync::Arc;

use async_trait::async_trait;

use impact_orchestrator::artifact::RiskLevel;
use impact_orchestrator::channel::ChannelError;
use impact_orchestrator::clients::news::{NewsArticle, NewsPayload, NewsProvider};
use impact_orchestrator::clients::research::{ResearchPayload, ResearchProvider};
use impact_orchestrator::clients::search::{SearchPayload, SearchProvider, SearchSnippet};
use impact_orchestrator::clients::AnalysisProvider;
use impact_orchestrator::config::{ChannelPolicy, OrchestratorConfig};
use impact_orchestrator::credibility::CredibilityTable;
use impact_orchestrator::orchestrator::Orchestrator;
use impact_orchestrator::progress::NullSink;
use impact_orchestrator::{Channel, RiskAssessment};

struct FaultyNews {
    fail: bool,
}

#[async_trait]
impl NewsProvider for FaultyNews {
    async fn fetch(&self, _s: &str, _k: &[String]) -> Result<NewsPayload, ChannelError> {
        if self.fail {
            return Err(ChannelError::upstream(Channel::News, Some(400), "injected"));
        }
        Ok(NewsPayload {
            articles: vec![NewsArticle {
                title: "a".into(),
                url: "https://reuters.com/a".into(),
                summary: String::new(),
                published_at: None,
            }],
        })
    }
    fn name(&self) -> &'static str {
        "faulty-news"
    }
}

struct FaultySearch {
    fail: bool,
}

#[async_trait]
impl SearchProvider for FaultySearch {
    async fn search(&self, _s: &str) -> Result<SearchPayload, ChannelError> {
        if self.fail {
            return Err(ChannelError::upstream(Channel::Search, Some(400), "injected"));
        }
        Ok(SearchPayload {
            snippets: vec![SearchSnippet {
                title: "s".into(),
                url: "https://wsj.com/s".into(),
                snippet: String::new(),
            }],
        })
    }
    fn name(&self) -> &'static str {
        "faulty-search"
    }
}

enum AnalysisMode {
    Ok,
    UpstreamFail,
    ParseFail,
}

struct FaultyAnalysis {
    mode: AnalysisMode,
}

#[async_trait]
impl AnalysisProvider for FaultyAnalysis {
    async fn assess(
        &self,
        _s: &str,
        _n: &serde_json::Value,
        _q: &serde_json::Value,
    ) -> Result<RiskAssessment, ChannelError> {
        match self.mode {
            AnalysisMode::Ok => Ok(RiskAssessment {
                risk_score: 64,
                risk_level: RiskLevel::Moderate,
                confidence: 70,
                impact_areas: vec![],
                key_insights: vec![],
                recommended_actions: vec![],
            }),
            AnalysisMode::UpstreamFail => Err(ChannelError::upstream(
                Channel::Analysis,
                Some(400),
                "injected",
            )),
            AnalysisMode::ParseFail => Err(ChannelError::parse(
                Channel::Analysis,
                "model answered with prose",
            )),
        }
    }
    fn name(&self) -> &'static str {
        "faulty-analysis"
    }
}

struct FaultyResearch {
    fail: bool,
}

#[async_trait]
impl ResearchProvider for FaultyResearch {
    async fn research(&self, _s: &str) -> Result<ResearchPayload, ChannelError> {
        if self.fail {
            return Err(ChannelError::upstream(
                Channel::DeepResearch,
                Some(400),
                "injected",
            ));
        }
        Ok(ResearchPayload {
            report: "r".into(),
            citations: vec![serde_json::json!("https://reuters.com/c")],
        })
    }
    fn name(&self) -> &'static str {
        "faulty-research"
    }
}

fn fast_config() -> OrchestratorConfig {
    let policy = ChannelPolicy {
        max_attempts: 1,
        backoff_base_ms: 1,
        ..ChannelPolicy::default()
    };
    OrchestratorConfig {
        news: policy.clone(),
        search: policy.clone(),
        analysis: policy.clone(),
        deep_research: policy,
        ..OrchestratorConfig::default()
    }
}

fn orchestrator_with_faults(
    news_fail: bool,
    search_fail: bool,
    analysis_mode: AnalysisMode,
    research_fail: bool,
) -> Orchestrator {
    Orchestrator::new(
        fast_config(),
        Arc::new(FaultyNews { fail: news_fail }),
        Arc::new(FaultySearch { fail: search_fail }),
        Arc::new(FaultyAnalysis { mode: analysis_mode }),
        Arc::new(FaultyResearch { fail: research_fail }),
        CredibilityTable::default_seed(),
        Arc::new(NullSink),
    )
}

#[tokio::test]
async fn every_failure_combination_yields_a_card() {
    for mask in 0u8..16 {
        let news_fail = mask & 1 != 0;
        let search_fail = mask & 2 != 0;
        let analysis_fail = mask & 4 != 0;
        let research_fail = mask & 8 != 0;

        let orch = orchestrator_with_faults(
            news_fail,
            search_fail,
            if analysis_fail {
                AnalysisMode::UpstreamFail
            } else {
                AnalysisMode::Ok
            },
            research_fail,
        );

        let out = orch
            .produce("Acme Corp", &[])
            .await
            .unwrap_or_else(|e| panic!("mask {mask}: produce failed: {e}"));
        let card = out.card;

        let expected = [news_fail, search_fail, analysis_fail, research_fail];
        let channels = [
            Channel::News,
            Channel::Search,
            Channel::Analysis,
            Channel::DeepResearch,
        ];
        for (i, channel) in channels.iter().enumerate() {
            let diag = card
                .diagnostics
                .iter()
                .find(|d| d.channel == *channel)
                .expect("diagnostics for every channel");
            assert_eq!(
                diag.degraded, expected[i],
                "mask {mask}: wrong degraded flag for {channel}"
            );
            assert_eq!(diag.error.is_some(), expected[i]);
        }

        // More than one degraded channel always flags the card.
        if card.degraded_channels() > 1 {
            assert!(card.requires_review, "mask {mask}");
        }
        // Failed channels contribute no sources.
        if news_fail {
            assert_eq!(card.sources.news, 0);
        }
        if research_fail {
            assert_eq!(card.sources.deep_research, 0);
        }
    }
}

#[tokio::test]
async fn analysis_parse_error_degrades_to_neutral_fallback() {
    let orch = orchestrator_with_faults(false, false, AnalysisMode::ParseFail, false);
    let out = orch.produce("Acme Corp", &[]).await.expect("produce");
    let card = out.card;

    let diag = &card.diagnostics[2];
    assert_eq!(diag.channel, Channel::Analysis);
    assert!(diag.degraded);
    assert!(diag.error.as_deref().unwrap_or("").contains("unparseable"));

    // Neutral fallback: mid-scale risk, zero confidence, nothing fabricated.
    assert_eq!(card.risk_score, 50);
    assert_eq!(card.risk_level, RiskLevel::Unknown);
    assert_eq!(card.confidence, 0);
    assert!(card.key_insights.is_empty());
    // Other channels still contribute their sources.
    assert_eq!(card.sources.news, 1);
    assert_eq!(card.sources.search, 1);
}

#[tokio::test]
async fn all_channels_down_still_returns_a_flagged_card() {
    let orch = orchestrator_with_faults(true, true, AnalysisMode::UpstreamFail, true);
    let out = orch.produce("Acme Corp", &[]).await.expect("produce");
    let card = out.card;

    assert_eq!(card.degraded_channels(), 4);
    assert!(card.requires_review);
    assert_eq!(card.sources.total, 0);
    assert_eq!(card.credibility, 0.0);
    assert_eq!(card.risk_score, 50);
    assert_eq!(card.confidence, 0);
    assert_eq!(out.usage.news.degraded, 1);
    assert_eq!(out.usage.news.failures, 1);
}

#[tokio::test]
async fn single_degraded_channel_with_strong_sources_passes_review() {
    // Only deep research down; the remaining tier-1/2 sources keep the
    // composite above the default threshold.
    let orch = orchestrator_with_faults(false, false, AnalysisMode::Ok, true);
    let out = orch.produce("Acme Corp", &[]).await.expect("produce");
    assert_eq!(out.card.degraded_channels(), 1);
    assert!(out.card.credibility > 0.5);
    assert!(!out.card.requires_review);
}
