//! Responses produced by the interceptor

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;
use shell_proxy::NetworkResponse;
use shell_storage::CachedResponse;
use tracing::debug;

/// Status text of the synthetic offline response
pub const OFFLINE_STATUS_TEXT: &str = "Offline";

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Served from the current store
    Hit,
    /// Fetched from the network after a store miss
    Miss,
    /// Root document served for a navigation
    Shell,
    /// Navigation fetched from the network (no root document stored)
    Network,
    /// Synthetic response after a network failure
    Offline,
    /// Not intercepted
    Bypass,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Hit => "hit",
            ResponseSource::Miss => "miss",
            ResponseSource::Shell => "shell",
            ResponseSource::Network => "network",
            ResponseSource::Offline => "offline",
            ResponseSource::Bypass => "bypass",
        }
    }
}

/// A response returned to the client
#[derive(Debug, Clone)]
pub struct ShellResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl ShellResponse {
    pub fn from_cached(cached: CachedResponse, source: ResponseSource) -> Self {
        let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);

        let mut headers = HeaderMap::with_capacity(cached.headers.len());
        for (name, value) in &cached.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => debug!("Dropping unrepresentable stored header {}", name),
            }
        }

        Self {
            status,
            headers,
            body: cached.body,
            source,
        }
    }

    pub fn from_network(response: NetworkResponse, source: ResponseSource) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            source,
        }
    }

    /// The synthetic 503 returned when neither store nor network can answer
    pub fn offline() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers,
            body: Bytes::from_static(OFFLINE_STATUS_TEXT.as_bytes()),
            source: ResponseSource::Offline,
        }
    }
}

/// Convert a network response into a storable record
pub fn to_cached(response: &NetworkResponse) -> CachedResponse {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    CachedResponse::new(response.status.as_u16(), headers, response.body.clone())
}
