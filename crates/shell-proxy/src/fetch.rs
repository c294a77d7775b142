//! Network fetch abstraction

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::ProxyError;

/// A request handed to the network
#[derive(Debug, Clone)]
pub struct NetworkRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl NetworkRequest {
    /// A bodiless GET request, as issued when precaching
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// A fully buffered network response
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl NetworkResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// The network as seen by the cache
///
/// An `Err` means the transport failed (connection refused, timeout, DNS).
/// Any HTTP status, including 4xx and 5xx, is an `Ok` response.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &NetworkRequest) -> Result<NetworkResponse, ProxyError>;
}
