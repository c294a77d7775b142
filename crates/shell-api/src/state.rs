//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use shell_core::{CacheManager, LifecycleController, RequestInterceptor};
use shell_proxy::Fetcher;
use std::sync::Arc;

/// Handle used to render the Prometheus exposition
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub lifecycle: Arc<LifecycleController>,
    pub interceptor: Arc<RequestInterceptor>,
    /// Used for requests the interceptor passes through
    pub network: Arc<dyn Fetcher>,
}

impl AppState {
    pub fn new(
        cache: Arc<CacheManager>,
        lifecycle: Arc<LifecycleController>,
        interceptor: Arc<RequestInterceptor>,
        network: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            cache,
            lifecycle,
            interceptor,
            network,
        }
    }
}
