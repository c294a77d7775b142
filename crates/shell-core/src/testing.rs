//! Test doubles shared by the unit tests

use async_trait::async_trait;
use http::StatusCode;
use parking_lot::RwLock;
use shell_proxy::{Fetcher, NetworkRequest, NetworkResponse, ProxyError};
use shell_storage::MemoryStorage;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use crate::cache::CacheManager;
use crate::manifest::{Manifest, ManifestConfig};
use crate::version::{Namespace, VersionTag};

pub const SCOPE: &str = "http://shell.local";

/// Scripted network keyed by path, counting every call
#[derive(Default)]
pub struct MockNetwork {
    routes: RwLock<HashMap<String, (StatusCode, &'static str)>>,
    offline: RwLock<bool>,
    calls: AtomicUsize,
    requested: RwLock<Vec<String>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, path: &str, status: StatusCode, body: &'static str) {
        self.routes
            .write()
            .insert(path.to_string(), (status, body));
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.read().clone()
    }
}

#[async_trait]
impl Fetcher for MockNetwork {
    async fn fetch(&self, request: &NetworkRequest) -> Result<NetworkResponse, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let target = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };
        self.requested.write().push(target);

        if *self.offline.read() {
            return Err(ProxyError::Unavailable("offline".to_string()));
        }

        match self.routes.read().get(request.url.path()) {
            Some((status, body)) => Ok(NetworkResponse::new(*status, *body)),
            None => Ok(NetworkResponse::new(StatusCode::NOT_FOUND, "")),
        }
    }
}

pub fn scope() -> Url {
    Url::parse(SCOPE).unwrap()
}

pub fn manifest(precache: &[&str], optional: &[&str], patterns: &[&str]) -> Arc<Manifest> {
    let strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
    Arc::new(
        Manifest::new(ManifestConfig {
            root_document: "/index.html".to_string(),
            precache: strings(precache),
            optional: strings(optional),
            runtime_patterns: strings(patterns),
        })
        .unwrap(),
    )
}

pub fn cache(storage: Arc<MemoryStorage>) -> Arc<CacheManager> {
    Arc::new(CacheManager::new(storage, Namespace::new("turbosign").unwrap()))
}

pub fn version(tag: &str) -> VersionTag {
    VersionTag::new(tag).unwrap()
}
