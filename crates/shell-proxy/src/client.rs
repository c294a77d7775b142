//! Origin server client

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderName};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::ProxyError;
use crate::fetch::{Fetcher, NetworkRequest, NetworkResponse};

/// Headers that describe a single connection and are never forwarded
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

/// Origin client configuration
#[derive(Clone, Debug)]
pub struct OriginClientConfig {
    /// Base URL of the origin serving the viewer assets
    pub url: String,
    /// Public origin of the shell. Requests under it are rewritten to `url`.
    pub scope: String,
    /// Username for basic authentication against the origin
    pub username: Option<String>,
    /// Password for basic authentication against the origin
    pub password: Option<String>,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
    /// Transport timeout; `None` leaves reqwest's default (no timeout)
    pub timeout: Option<Duration>,
}

/// HTTP client for the origin server
pub struct OriginClient {
    config: OriginClientConfig,
    client: Client,
    origin: Url,
    scope: Url,
}

impl OriginClient {
    /// Create a new origin client
    pub fn new(config: OriginClientConfig) -> Result<Self, ProxyError> {
        let origin = Url::parse(&config.url)
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        let scope = Url::parse(&config.scope)
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", config.scope, e)))?;

        let mut builder = Client::builder();

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;

        info!("Created origin client for {} (scope {})", origin, scope);

        Ok(Self {
            config,
            client,
            origin,
            scope,
        })
    }

    /// Map a request URL onto the network.
    ///
    /// In-scope URLs are resolved against the origin base URL, keeping path
    /// and query. URLs of any other origin are refused: the client only ever
    /// talks to its origin.
    pub fn resolve(&self, url: &Url) -> Result<Url, ProxyError> {
        if url.origin() != self.scope.origin() {
            return Err(ProxyError::OutOfScope(url.to_string()));
        }

        let mut target = self.origin.clone();
        let base = self.origin.path().trim_end_matches('/');
        target.set_path(&format!("{}{}", base, url.path()));
        target.set_query(url.query());
        Ok(target)
    }

    /// Check if the origin is reachable
    pub async fn ping(&self) -> Result<bool, ProxyError> {
        let response = self.client.head(self.origin.clone()).send().await?;
        Ok(!response.status().is_server_error())
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

#[async_trait]
impl Fetcher for OriginClient {
    async fn fetch(&self, request: &NetworkRequest) -> Result<NetworkResponse, ProxyError> {
        let url = self.resolve(&request.url)?;

        debug!("Fetching {} {}", request.method, url);

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone());

        if let Some(username) = &self.config.username {
            builder = builder.basic_auth(username, self.config.password.as_ref());
        }

        let response = builder.send().await?;
        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        // The body is buffered below; the server recomputes the length
        headers.remove(header::CONTENT_LENGTH);

        let body = response.bytes().await?;

        debug!("Fetched {} ({} bytes)", status, body.len());

        Ok(NetworkResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(origin: &str) -> OriginClient {
        OriginClient::new(OriginClientConfig {
            url: origin.to_string(),
            scope: "http://shell.local:8080".to_string(),
            username: None,
            password: None,
            skip_tls_verify: false,
            timeout: None,
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_in_scope() {
        let client = client("http://assets.internal:9000/static/");
        let url = Url::parse("http://shell.local:8080/build/pdf.mjs?v=2").unwrap();

        assert_eq!(
            client.resolve(&url).unwrap().as_str(),
            "http://assets.internal:9000/static/build/pdf.mjs?v=2"
        );
    }

    #[test]
    fn test_resolve_out_of_scope() {
        let client = client("http://assets.internal:9000");
        let url = Url::parse("https://cdn.example.com/font.woff2").unwrap();
        assert!(matches!(client.resolve(&url), Err(ProxyError::OutOfScope(_))));

        // Same host, different port is another origin
        let url = Url::parse("http://shell.local:9090/index.html").unwrap();
        assert!(client.resolve(&url).is_err());
    }

    #[test]
    fn test_invalid_origin() {
        let result = OriginClient::new(OriginClientConfig {
            url: "not a url".to_string(),
            scope: "http://shell.local".to_string(),
            username: None,
            password: None,
            skip_tls_verify: false,
            timeout: None,
        });
        assert!(matches!(result, Err(ProxyError::InvalidUrl(_))));
    }
}
