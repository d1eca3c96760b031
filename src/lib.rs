// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod artifact;
pub mod breaker;
pub mod channel;
pub mod clients;
pub mod config;
pub mod credibility;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod ratelimit;
pub mod retry;
pub mod usage;

// ---- Re-exports for stable public API ----
pub use crate::artifact::{ImpactCard, RiskAssessment, RiskLevel};
pub use crate::channel::{Channel, ChannelError, ChannelResult, SourceReference};
pub use crate::config::OrchestratorConfig;
pub use crate::orchestrator::{HealthStatus, Orchestrator, ProduceOutput};
pub use crate::progress::{ProgressEvent, ProgressSink, ProgressStatus};
