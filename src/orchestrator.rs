//! # Orchestrator
//! Coordinates the four channel clients with the one cross-channel ordering
//! dependency the pipeline has: analysis consumes the settled news and
//! search results, so the fan-out runs in two stages
//! (news ∥ search, then analysis ∥ deep-research).
//!
//! Degradation policy is explicit: the caller always receives a well-formed
//! `ImpactCard` — the only hard failure is malformed caller input. Every
//! channel settles to a real or fallback result inside its own time budget,
//! so one slow or failing upstream never cascades.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge};
use serde::Serialize;

use crate::artifact::{ChannelDiagnostics, ImpactCard, RiskAssessment, SourceBreakdown};
use crate::breaker::BreakerSnapshot;
use crate::channel::{Channel, ChannelError, ChannelResult};
use crate::clients::{
    AnalysisClient, AnalysisProvider, DeepResearchClient, HttpAnalysisProvider, HttpNewsProvider,
    HttpResearchProvider, HttpSearchProvider, NewsClient, NewsProvider, ResearchProvider,
    SearchClient, SearchProvider,
};
use crate::config::OrchestratorConfig;
use crate::credibility::{CredibilityTable, ScoredSource};
use crate::progress::{ProgressEvent, ProgressSink, ProgressStatus, TracingSink};
use crate::retry::RetryExecutor;
use crate::usage::{UsageAccumulator, UsageSnapshot};

pub const DEFAULT_CREDIBILITY_PATH: &str = "config/credibility.json";

const MAX_SUBJECT_CHARS: usize = 300;
const MAX_KEYWORDS: usize = 20;

/// Per-channel breaker view for monitoring collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub news: BreakerSnapshot,
    pub search: BreakerSnapshot,
    pub analysis: BreakerSnapshot,
    pub deep_research: BreakerSnapshot,
}

/// The artifact plus the process-wide counters as incremented by this call.
#[derive(Debug, Clone, Serialize)]
pub struct ProduceOutput {
    pub card: ImpactCard,
    pub usage: UsageSnapshot,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    news: NewsClient,
    search: SearchClient,
    analysis: AnalysisClient,
    research: DeepResearchClient,
    credibility: CredibilityTable,
    sink: Arc<dyn ProgressSink>,
    usage: Arc<UsageAccumulator>,
}

impl Orchestrator {
    /// Wire the orchestrator from injected providers. Breakers and rate
    /// windows are constructed once here and shared across requests; there
    /// is no hidden global state.
    pub fn new(
        config: OrchestratorConfig,
        news: Arc<dyn NewsProvider>,
        search: Arc<dyn SearchProvider>,
        analysis: Arc<dyn AnalysisProvider>,
        research: Arc<dyn ResearchProvider>,
        credibility: CredibilityTable,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let news_exec = RetryExecutor::from_policy(Channel::News, &config.news);
        let search_exec = RetryExecutor::from_policy(Channel::Search, &config.search);
        let analysis_exec = RetryExecutor::from_policy(Channel::Analysis, &config.analysis);
        let research_exec = RetryExecutor::from_policy(Channel::DeepResearch, &config.deep_research);
        Self {
            news: NewsClient::new(news, news_exec),
            search: SearchClient::new(search, search_exec),
            analysis: AnalysisClient::new(analysis, analysis_exec),
            research: DeepResearchClient::new(research, research_exec),
            config,
            credibility,
            sink,
            usage: Arc::new(UsageAccumulator::new()),
        }
    }

    /// Production wiring: HTTP providers configured from the environment,
    /// credibility table from disk, progress to the log.
    pub fn from_env(config: OrchestratorConfig) -> Self {
        Self::new(
            config,
            Arc::new(HttpNewsProvider::from_env()),
            Arc::new(HttpSearchProvider::from_env()),
            Arc::new(HttpAnalysisProvider::from_env()),
            Arc::new(HttpResearchProvider::from_env()),
            CredibilityTable::load_from_file(DEFAULT_CREDIBILITY_PATH),
            Arc::new(TracingSink),
        )
    }

    /// Produce one impact card for the subject. Two fan-out stages, then
    /// credibility aggregation and assembly. Never returns a hard error for
    /// upstream-caused failures; only malformed input aborts.
    pub async fn produce(
        &self,
        subject: &str,
        keywords: &[String],
    ) -> Result<ProduceOutput, ChannelError> {
        let subject = validate_subject(subject)?;
        let keywords = validate_keywords(keywords)?;
        let started = Instant::now();

        // Stage 1: news and search in parallel. Each settles independently,
        // a slow channel never blocks the other.
        let (news_result, search_result) = tokio::join!(
            self.run_stage(Channel::News, 10, 40, self.news.fetch(&subject, &keywords)),
            self.run_stage(Channel::Search, 10, 40, self.search.fetch(&subject)),
        );

        // Stage 2: analysis consumes the settled stage-1 results (degraded
        // or not); deep research has no input dependency.
        let ((analysis_result, assessment), research_result) = tokio::join!(
            self.run_analysis(&subject, &news_result, &search_result),
            self.run_stage(Channel::DeepResearch, 50, 90, self.research.fetch(&subject)),
        );

        // Score every source reference across all four channels.
        let scored = self.score_sources(&[
            &news_result,
            &search_result,
            &analysis_result,
            &research_result,
        ]);
        let report = self.credibility.aggregate(&scored, self.config.top_sources_limit);

        let card = self.assemble(
            subject,
            keywords,
            assessment,
            report.composite,
            report.histogram,
            report.top_sources,
            [news_result, search_result, analysis_result, research_result],
            started,
        );

        self.emit("assemble", ProgressStatus::Completed, 100).await;
        self.usage.record_produce();
        counter!("orchestrator_produce_total").increment(1);
        gauge!("orchestrator_last_produce_ts").set(chrono::Utc::now().timestamp() as f64);

        Ok(ProduceOutput {
            card,
            usage: self.usage.snapshot(),
        })
    }

    /// Run one channel future with its progress envelope and usage
    /// accounting. The future itself already settles to a `ChannelResult`.
    async fn run_stage(
        &self,
        channel: Channel,
        start_pct: u8,
        done_pct: u8,
        fut: impl std::future::Future<Output = ChannelResult>,
    ) -> ChannelResult {
        self.emit(channel.name(), ProgressStatus::InProgress, start_pct)
            .await;
        let result = fut.await;
        self.settle(channel, &result, done_pct).await;
        result
    }

    async fn run_analysis(
        &self,
        subject: &str,
        news: &ChannelResult,
        search: &ChannelResult,
    ) -> (ChannelResult, RiskAssessment) {
        self.emit(Channel::Analysis.name(), ProgressStatus::InProgress, 50)
            .await;
        let (result, assessment) = self.analysis.analyze(subject, news, search).await;
        self.settle(Channel::Analysis, &result, 90).await;
        (result, assessment)
    }

    async fn settle(&self, channel: Channel, result: &ChannelResult, done_pct: u8) {
        self.usage.record_channel(
            channel,
            result.degraded,
            result.error.is_some(),
            result.latency_ms,
        );
        let status = if result.degraded {
            ProgressStatus::Error
        } else {
            ProgressStatus::Completed
        };
        self.emit(channel.name(), status, done_pct).await;
    }

    async fn emit(&self, stage: &str, status: ProgressStatus, progress: u8) {
        self.sink
            .emit(ProgressEvent::new(stage, status, progress))
            .await;
    }

    fn score_sources(&self, results: &[&ChannelResult]) -> Vec<ScoredSource> {
        results
            .iter()
            .flat_map(|r| {
                r.sources
                    .iter()
                    .map(|s| self.credibility.score(r.channel, s))
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        subject: String,
        keywords: Vec<String>,
        assessment: RiskAssessment,
        composite: f32,
        tiers: crate::credibility::TierHistogram,
        top_sources: Vec<ScoredSource>,
        results: [ChannelResult; 4],
        started: Instant,
    ) -> ImpactCard {
        let count = |c: Channel| {
            results
                .iter()
                .find(|r| r.channel == c)
                .map(|r| r.sources.len())
                .unwrap_or(0)
        };
        let breakdown = SourceBreakdown {
            total: results.iter().map(|r| r.sources.len()).sum(),
            news: count(Channel::News),
            search: count(Channel::Search),
            analysis: count(Channel::Analysis),
            deep_research: count(Channel::DeepResearch),
            tiers,
            top_sources,
        };

        let diagnostics: Vec<ChannelDiagnostics> = results
            .iter()
            .map(|r| ChannelDiagnostics {
                channel: r.channel,
                degraded: r.degraded,
                error: r.error.clone(),
                latency_ms: r.latency_ms,
            })
            .collect();

        let degraded_count = diagnostics.iter().filter(|d| d.degraded).count();
        let requires_review =
            composite < self.config.credibility_review_threshold || degraded_count > 1;

        ImpactCard {
            subject,
            keywords,
            risk_score: assessment.risk_score,
            risk_level: assessment.risk_level,
            confidence: assessment.confidence,
            credibility: composite,
            requires_review,
            impact_areas: assessment.impact_areas,
            key_insights: assessment.key_insights,
            recommended_actions: assessment.recommended_actions,
            sources: breakdown,
            diagnostics,
            processing_ms: started.elapsed().as_millis() as u64,
            generated_at: chrono::Utc::now(),
        }
    }

    /// Read-only breaker snapshot for monitoring collaborators.
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus {
            news: self.news.executor().breaker().snapshot(),
            search: self.search.executor().breaker().snapshot(),
            analysis: self.analysis.executor().breaker().snapshot(),
            deep_research: self.research.executor().breaker().snapshot(),
        }
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

fn validate_subject(subject: &str) -> Result<String, ChannelError> {
    let s = subject.trim();
    if s.is_empty() {
        return Err(ChannelError::InvalidInput("subject must not be empty".into()));
    }
    if s.chars().count() > MAX_SUBJECT_CHARS {
        return Err(ChannelError::InvalidInput(format!(
            "subject exceeds {MAX_SUBJECT_CHARS} characters"
        )));
    }
    Ok(s.to_string())
}

fn validate_keywords(keywords: &[String]) -> Result<Vec<String>, ChannelError> {
    if keywords.len() > MAX_KEYWORDS {
        return Err(ChannelError::InvalidInput(format!(
            "at most {MAX_KEYWORDS} keywords allowed"
        )));
    }
    let mut out = Vec::with_capacity(keywords.len());
    for k in keywords {
        let k = k.trim();
        if k.is_empty() {
            return Err(ChannelError::InvalidInput("empty keyword".into()));
        }
        out.push(k.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_validation() {
        assert!(validate_subject("  Acme Corp  ").is_ok());
        assert!(validate_subject("").is_err());
        assert!(validate_subject("   ").is_err());
        assert!(validate_subject(&"x".repeat(400)).is_err());
    }

    #[test]
    fn keyword_validation() {
        assert!(validate_keywords(&["supply chain".to_string()]).is_ok());
        assert!(validate_keywords(&["".to_string()]).is_err());
        let too_many: Vec<String> = (0..30).map(|i| format!("k{i}")).collect();
        assert!(validate_keywords(&too_many).is_err());
    }
}
