//! API routes

mod health;
mod intercept;
pub mod metrics;
mod open;
mod status;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, MetricsHandle};

/// Largest request body buffered for interception
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(status::routes())
        .merge(open::routes())
        // Everything else belongs to the hosted application
        .fallback(intercept::intercept)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router.layer(TraceLayer::new_for_http())
}
