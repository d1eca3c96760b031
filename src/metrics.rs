use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("orchestrator_produce_total", "Completed produce calls.");
        describe_counter!(
            "orchestrator_channel_calls_total",
            "Settled channel calls, labeled by channel and degraded flag."
        );
        describe_counter!(
            "orchestrator_retries_total",
            "Retry attempts after a transient upstream failure."
        );
        describe_counter!(
            "orchestrator_breaker_rejections_total",
            "Calls rejected fast by an open circuit breaker."
        );
        describe_counter!(
            "orchestrator_rate_rejections_total",
            "Calls rejected by the per-channel rate window."
        );
        describe_histogram!(
            "orchestrator_channel_latency_ms",
            "Per-channel settle latency in milliseconds."
        );
        describe_gauge!(
            "orchestrator_last_produce_ts",
            "Unix ts of the last completed produce call."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register series descriptions.
    pub fn init() -> Self {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_metrics_described();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
