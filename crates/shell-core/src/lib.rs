//! Shell Cache Core Business Logic
//!
//! This crate provides the offline caching protocol of the viewer shell:
//! versioned stores, the asset manifest, the install/activate lifecycle and
//! the per-request interceptor.

pub mod cache;
pub mod error;
pub mod interceptor;
pub mod lifecycle;
pub mod manifest;
pub mod response;
pub mod version;
pub mod viewer;

#[cfg(test)]
mod testing;

pub use cache::{CacheManager, CacheStats, MatchOptions};
pub use error::CoreError;
pub use interceptor::{
    Bypass, InterceptedRequest, Interception, InterceptorStats, RequestInterceptor, Route,
};
pub use lifecycle::{LifecycleController, LifecycleStatus, VersionState};
pub use manifest::{Manifest, ManifestConfig, RuntimePattern};
pub use response::{ResponseSource, ShellResponse};
pub use version::{Namespace, StoreHandle, VersionTag};
pub use viewer::{
    DocumentEngine, EngineAction, ReadinessPolicy, SidebarView, ViewerShell, ZoomValue, viewer_url,
};
