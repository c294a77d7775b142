//! Document open redirect

use axum::{
    Router,
    extract::Query,
    response::Redirect,
    routing::get,
};
use serde::Deserialize;
use shell_core::viewer_url;
use tracing::debug;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct OpenQuery {
    file: Option<String>,
}

/// GET /_shell/open?file=URL
async fn open(Query(query): Query<OpenQuery>) -> Redirect {
    let location = viewer_url(query.file.as_deref());
    debug!("Opening viewer at {}", location);
    Redirect::to(&location)
}

/// Create open routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/_shell/open", get(open))
}
