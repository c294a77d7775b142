//! Core error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] shell_storage::StorageError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] shell_proxy::ProxyError),

    #[error("Invalid version tag: {0}")]
    InvalidVersion(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Response not cacheable: status {0}")]
    NotCacheable(u16),

    #[error("Precache of {path} failed: {reason}")]
    Precache { path: String, reason: String },

    #[error("Install of {version} failed: {reason}")]
    InstallFailed { version: String, reason: String },

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Invalid zoom value: {0}")]
    InvalidZoom(String),

    #[error("Document engine unavailable after {0:?}")]
    CollaboratorUnavailable(Duration),

    #[error("Document engine error: {0}")]
    Engine(String),
}
