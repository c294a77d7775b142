//! Shell Cache HTTP API
//!
//! This crate provides the Axum-based HTTP surface of the shell cache: the
//! interception fallback that serves every application request, and the
//! `/_shell` management endpoints.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
