//! Per-request routing between the active store and the network

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use parking_lot::RwLock;
use serde::Serialize;
use shell_proxy::{Fetcher, NetworkRequest};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheManager, MatchOptions};
use crate::lifecycle::LifecycleController;
use crate::manifest::Manifest;
use crate::response::{ResponseSource, ShellResponse, to_cached};
use crate::version::StoreHandle;

/// A request seen by the interceptor
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    /// Top-level document load
    pub navigate: bool,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            navigate: false,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn navigation(url: Url) -> Self {
        Self {
            navigate: true,
            ..Self::get(url)
        }
    }

    /// The same request, as sent to the network
    pub fn to_network(&self) -> NetworkRequest {
        NetworkRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// Origin-relative form used for cache keys
    fn cache_url(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// Routing decision, first match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    CrossOrigin,
    Navigation,
    Runtime,
    Unmatched,
}

/// Why a request was left to the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    CrossOrigin,
    Unmatched,
    /// No store is active
    Inactive,
}

/// Outcome of one interception
#[derive(Debug)]
pub enum Interception {
    Respond(ShellResponse),
    PassThrough(Bypass),
}

/// Outcome counters since process start
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterceptorStats {
    pub hits: u64,
    pub misses: u64,
    pub navigations: u64,
    pub offline: u64,
    pub bypassed: u64,
}

/// Answers requests from the active store, filling it at runtime
pub struct RequestInterceptor {
    cache: Arc<CacheManager>,
    manifest: Arc<Manifest>,
    lifecycle: Arc<LifecycleController>,
    network: Arc<dyn Fetcher>,
    scope: Url,
    options: MatchOptions,
    writes: TaskTracker,
    stats: RwLock<InterceptorStats>,
}

impl RequestInterceptor {
    pub fn new(
        cache: Arc<CacheManager>,
        manifest: Arc<Manifest>,
        lifecycle: Arc<LifecycleController>,
        network: Arc<dyn Fetcher>,
        scope: Url,
        options: MatchOptions,
    ) -> Self {
        Self {
            cache,
            manifest,
            lifecycle,
            network,
            scope,
            options,
            writes: TaskTracker::new(),
            stats: RwLock::new(InterceptorStats::default()),
        }
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn stats(&self) -> InterceptorStats {
        self.stats.read().clone()
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Route {
        if request.url.origin() != self.scope.origin() {
            Route::CrossOrigin
        } else if request.navigate {
            Route::Navigation
        } else if request.method == Method::GET
            && self.manifest.matches_runtime_pattern(request.url.path())
        {
            Route::Runtime
        } else {
            Route::Unmatched
        }
    }

    pub async fn intercept(&self, request: &InterceptedRequest) -> Interception {
        let route = self.classify(request);

        let interception = match (route, self.lifecycle.active_handle()) {
            (Route::CrossOrigin, _) => Interception::PassThrough(Bypass::CrossOrigin),
            (Route::Unmatched, _) => Interception::PassThrough(Bypass::Unmatched),
            (_, None) => Interception::PassThrough(Bypass::Inactive),
            (Route::Navigation, Some(handle)) => {
                Interception::Respond(self.navigate(&handle, request).await)
            }
            (Route::Runtime, Some(handle)) => {
                Interception::Respond(self.cache_first(&handle, request).await)
            }
        };

        let source = match &interception {
            Interception::Respond(response) => response.source,
            Interception::PassThrough(_) => ResponseSource::Bypass,
        };
        debug!("{} {} -> {:?} ({})", request.method, request.url, route, source.as_str());
        self.record(source);

        interception
    }

    /// Wait for outstanding background store writes
    pub async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    async fn navigate(&self, handle: &StoreHandle, request: &InterceptedRequest) -> ShellResponse {
        // The root document is looked up without its query, whatever the request carried.
        // Shell serves are counted as navigations, not as store hits or misses.
        let root = self
            .cache
            .lookup(
                handle,
                "GET",
                self.manifest.root_document(),
                MatchOptions { ignore_query: true },
            )
            .await
            .unwrap_or_else(|e| {
                warn!("Root document lookup in {} failed: {}", handle, e);
                None
            });

        if let Some(cached) = root {
            return ShellResponse::from_cached(cached, ResponseSource::Shell);
        }

        match self.network.fetch(&request.to_network()).await {
            Ok(response) => ShellResponse::from_network(response, ResponseSource::Network),
            Err(e) => {
                warn!("Navigation to {} failed: {}", request.url, e);
                ShellResponse::offline()
            }
        }
    }

    async fn cache_first(&self, handle: &StoreHandle, request: &InterceptedRequest) -> ShellResponse {
        let url = request.cache_url();

        match self.cache.get(handle, "GET", &url, self.options).await {
            Ok(Some(cached)) => return ShellResponse::from_cached(cached, ResponseSource::Hit),
            Ok(None) => {}
            Err(e) => warn!("Lookup of {} in {} failed: {}", url, handle, e),
        }

        let response = match self.network.fetch(&request.to_network()).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Fetch of {} failed, answering offline: {}", request.url, e);
                return ShellResponse::offline();
            }
        };

        if response.status == StatusCode::OK {
            let cache = self.cache.clone();
            let handle = handle.clone();
            let record = to_cached(&response);
            let options = self.options;

            self.writes.spawn(async move {
                if let Err(e) = cache.put(&handle, "GET", &url, &record, options).await {
                    warn!("Failed to store {} in {}: {}", url, handle, e);
                }
            });
        }

        ShellResponse::from_network(response, ResponseSource::Miss)
    }

    fn record(&self, source: ResponseSource) {
        metrics::counter!("shell_cache_requests_total", "outcome" => source.as_str()).increment(1);

        let mut stats = self.stats.write();
        match source {
            ResponseSource::Hit => stats.hits += 1,
            ResponseSource::Miss => stats.misses += 1,
            ResponseSource::Shell | ResponseSource::Network => stats.navigations += 1,
            ResponseSource::Offline => stats.offline += 1,
            ResponseSource::Bypass => stats.bypassed += 1,
        }
    }
}
