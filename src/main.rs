//! Impact Orchestrator — Binary Entrypoint
//! Boots the monitoring HTTP server (health, usage, Prometheus metrics)
//! around one orchestrator instance wired from the environment.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use impact_orchestrator::api::{self, AppState};
use impact_orchestrator::config::{OrchestratorConfig, DEFAULT_CONFIG_PATH};
use impact_orchestrator::metrics::Metrics;
use impact_orchestrator::orchestrator::Orchestrator;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("impact_orchestrator=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments. This makes the
    // per-channel API keys and endpoints available before wiring.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config_path =
        std::env::var("ORCHESTRATOR_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = OrchestratorConfig::load_from_file(&config_path);

    let metrics = Metrics::init();
    let orchestrator = Arc::new(Orchestrator::from_env(config));

    let state = AppState { orchestrator };
    let router = api::create_router(state).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    tracing::info!(%addr, "monitoring server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
