//! Monitoring surface only: breaker health and usage counters for
//! health/monitoring collaborators. The route layer that exposes the
//! produce pipeline to clients lives outside this crate.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::orchestrator::{HealthStatus, Orchestrator};
use crate::usage::UsageSnapshot;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/usage", get(usage))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.orchestrator.health_status())
}

async fn usage(State(state): State<AppState>) -> Json<UsageSnapshot> {
    Json(state.orchestrator.usage())
}
