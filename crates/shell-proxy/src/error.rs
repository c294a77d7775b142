//! Proxy error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Outside the shell scope: {0}")]
    OutOfScope(String),

    #[error("Network unavailable: {0}")]
    Unavailable(String),
}
