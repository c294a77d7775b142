//! Health check endpoint

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use shell_core::VersionState;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub state: VersionState,
}

/// GET /_shell/health
///
/// Degraded while no store is active: every request then goes to the network.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::counter!("shell_cache_health_checks_total").increment(1);

    let status = if state.lifecycle.active_handle().is_some() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: state.lifecycle.handle().version().to_string(),
        state: state.lifecycle.state(),
    })
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/_shell/health", get(health))
}
