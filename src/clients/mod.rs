//! # Channel Clients
//! One client per logical channel. Each issues its upstream call through the
//! retry executor and always settles to a `ChannelResult`: real on success,
//! fallback (degraded, empty sources, error recorded) on circuit-open,
//! rate-limit rejection, or exhausted retries. The orchestrator never sees
//! an error from a client.

pub mod analysis;
pub mod news;
pub mod research;
pub mod search;

use std::time::Instant;

use metrics::{counter, histogram};

use crate::channel::{Channel, ChannelError, ChannelResult};

pub use analysis::{AnalysisClient, AnalysisProvider, HttpAnalysisProvider};
pub use news::{HttpNewsProvider, NewsClient, NewsProvider};
pub use research::{DeepResearchClient, HttpResearchProvider, ResearchProvider};
pub use search::{HttpSearchProvider, SearchClient, SearchProvider};

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Shared settle-side telemetry for all clients.
pub(crate) fn record_settle(channel: Channel, result: &ChannelResult) {
    counter!(
        "orchestrator_channel_calls_total",
        "channel" => channel.name(),
        "degraded" => if result.degraded { "true" } else { "false" }
    )
    .increment(1);
    histogram!("orchestrator_channel_latency_ms", "channel" => channel.name())
        .record(result.latency_ms as f64);

    if result.degraded {
        tracing::warn!(
            channel = %channel,
            latency_ms = result.latency_ms,
            error = result.error.as_deref().unwrap_or("unknown"),
            "channel degraded, using fallback"
        );
    } else {
        tracing::debug!(
            channel = %channel,
            latency_ms = result.latency_ms,
            sources = result.sources.len(),
            "channel settled"
        );
    }
}

/// Build the degraded fallback for a channel, log and count it.
pub(crate) fn settle_fallback(
    channel: Channel,
    payload: serde_json::Value,
    err: &ChannelError,
    start: Instant,
) -> ChannelResult {
    let result = ChannelResult::fallback(channel, payload, err, elapsed_ms(start));
    record_settle(channel, &result);
    result
}
