//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shell_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Misdirected request: {0}")]
    MisdirectedRequest(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::MisdirectedRequest(msg) => (
                StatusCode::MISDIRECTED_REQUEST,
                "MISDIRECTED_REQUEST",
                msg.clone(),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg.clone()),
            ApiError::Core(e) => match e {
                CoreError::InstallFailed { .. } | CoreError::Precache { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "INSTALL_FAILED",
                    e.to_string(),
                ),
                CoreError::InvalidState { .. } => {
                    (StatusCode::CONFLICT, "INVALID_STATE", e.to_string())
                }
                CoreError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
                }
                CoreError::Proxy(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string()),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
        };

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
