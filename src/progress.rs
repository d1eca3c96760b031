//! # Progress Events
//! The orchestrator reports stage transitions through an injected sink.
//! Delivery semantics (fan-out to subscribers, persistence) belong to the
//! collaborator behind the sink; the orchestrator only guarantees one event
//! per channel transition plus one terminal event, in stage order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage name: a channel name or "assemble".
    pub stage: String,
    pub status: ProgressStatus,
    /// 0..=100 across the whole produce call.
    pub progress: u8,
}

impl ProgressEvent {
    pub fn new(stage: impl Into<String>, status: ProgressStatus, progress: u8) -> Self {
        Self {
            stage: stage.into(),
            status,
            progress: progress.min(100),
        }
    }
}

/// Injected notification sink. Implementations must not block the pipeline
/// for long; slow transports should buffer internally.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent);
}

/// Default sink: structured log lines only.
pub struct TracingSink;

#[async_trait]
impl ProgressSink for TracingSink {
    async fn emit(&self, event: ProgressEvent) {
        tracing::info!(
            stage = %event.stage,
            status = ?event.status,
            progress = event.progress,
            "orchestration progress"
        );
    }
}

/// Drops every event; for tests and headless runs.
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn emit(&self, _event: ProgressEvent) {}
}
