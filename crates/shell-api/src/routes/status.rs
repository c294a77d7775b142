//! Lifecycle status and update routes

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;
use shell_core::{CacheStats, InterceptorStats, LifecycleStatus, StoreHandle};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct StoreSummary {
    pub handle: StoreHandle,
    pub entries: usize,
    pub size_bytes: u64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub lifecycle: LifecycleStatus,
    pub stores: Vec<StoreSummary>,
    pub cache: CacheStats,
    pub requests: InterceptorStats,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub evicted: Vec<StoreHandle>,
    pub lifecycle: LifecycleStatus,
}

/// GET /_shell/status
async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let mut stores = Vec::new();
    for handle in state.cache.list_handles().await? {
        let entries = state.cache.entries(&handle).await?.len();
        let size_bytes = state.cache.size(&handle).await?;
        stores.push(StoreSummary {
            handle,
            entries,
            size_bytes,
        });
    }

    Ok(Json(StatusResponse {
        lifecycle: state.lifecycle.status(),
        stores,
        cache: state.cache.stats().await,
        requests: state.interceptor.stats(),
    }))
}

/// POST /_shell/update
///
/// Re-runs install and activation for the configured version.
async fn update(State(state): State<AppState>) -> Result<Json<UpdateResponse>, ApiError> {
    info!("Update requested for {}", state.lifecycle.handle());

    let evicted = state.lifecycle.run().await?;

    Ok(Json(UpdateResponse {
        evicted,
        lifecycle: state.lifecycle.status(),
    }))
}

/// Create status routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_shell/status", get(status))
        .route("/_shell/update", post(update))
}
