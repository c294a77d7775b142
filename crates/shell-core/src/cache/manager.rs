//! Cache manager implementation

use serde::Serialize;
use shell_storage::{CacheKey, CacheStore, CachedResponse};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::version::{Namespace, StoreHandle};

/// Lookup options. Writes and reads of one record must use the same options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Drop the query string from the key
    pub ignore_query: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { ignore_query: true }
    }
}

/// Cache counters since process start
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub write_count: u64,
    pub write_failure_count: u64,
}

/// Versioned view over a [`CacheStore`] backend
///
/// Only status-200 responses are written; everything else is rejected with
/// [`CoreError::NotCacheable`].
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    namespace: Namespace,
    stats: RwLock<CacheStats>,
}

impl CacheManager {
    /// Create a new cache manager
    pub fn new(store: Arc<dyn CacheStore>, namespace: Namespace) -> Self {
        info!("Initializing cache manager (namespace: {})", namespace);

        Self {
            store,
            namespace,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Create the store for `handle` if absent
    pub async fn open(&self, handle: &StoreHandle) -> Result<(), CoreError> {
        debug!("Opening store {}", handle);
        Ok(self.store.open(&handle.name()).await?)
    }

    /// Whether the store for `handle` exists
    pub async fn exists(&self, handle: &StoreHandle) -> Result<bool, CoreError> {
        Ok(self.store.exists(&handle.name()).await?)
    }

    /// Get a cached response, counting the hit or miss
    pub async fn get(
        &self,
        handle: &StoreHandle,
        method: &str,
        url: &str,
        options: MatchOptions,
    ) -> Result<Option<CachedResponse>, CoreError> {
        match self.lookup(handle, method, url, options).await? {
            Some(response) => {
                self.record_hit().await;
                Ok(Some(response))
            }
            None => {
                self.record_miss().await;
                Ok(None)
            }
        }
    }

    /// Get a cached response without touching the hit/miss counters
    pub async fn lookup(
        &self,
        handle: &StoreHandle,
        method: &str,
        url: &str,
        options: MatchOptions,
    ) -> Result<Option<CachedResponse>, CoreError> {
        let key = CacheKey::new(method, url, options.ignore_query);
        Ok(self.store.get(&handle.name(), &key).await?)
    }

    /// Store a response, replacing any previous record for the same key
    pub async fn put(
        &self,
        handle: &StoreHandle,
        method: &str,
        url: &str,
        response: &CachedResponse,
        options: MatchOptions,
    ) -> Result<(), CoreError> {
        if response.status != 200 {
            warn!(
                "Refusing to cache {} {} with status {}",
                method, url, response.status
            );
            self.record_write_failure().await;
            return Err(CoreError::NotCacheable(response.status));
        }

        let key = CacheKey::new(method, url, options.ignore_query);
        debug!("Caching {} in {} ({} bytes)", key, handle, response.body.len());

        match self.store.put(&handle.name(), &key, response).await {
            Ok(()) => {
                self.record_write().await;
                Ok(())
            }
            Err(e) => {
                self.record_write_failure().await;
                Err(e.into())
            }
        }
    }

    /// Delete a whole store
    pub async fn delete(&self, handle: &StoreHandle) -> Result<bool, CoreError> {
        debug!("Deleting store {}", handle);
        Ok(self.store.delete(&handle.name()).await?)
    }

    /// Every store handle under this manager's namespace
    pub async fn list_handles(&self) -> Result<Vec<StoreHandle>, CoreError> {
        Ok(self
            .store
            .list()
            .await?
            .iter()
            .filter_map(|name| StoreHandle::parse(&self.namespace, name))
            .collect())
    }

    /// Keys held by a store
    pub async fn entries(&self, handle: &StoreHandle) -> Result<Vec<CacheKey>, CoreError> {
        Ok(self.store.keys(&handle.name()).await?)
    }

    /// Encoded size of a store in bytes
    pub async fn size(&self, handle: &StoreHandle) -> Result<u64, CoreError> {
        Ok(self.store.size(&handle.name()).await?)
    }

    async fn record_hit(&self) {
        self.stats.write().await.hit_count += 1;
    }

    async fn record_miss(&self) {
        self.stats.write().await.miss_count += 1;
    }

    async fn record_write(&self) {
        self.stats.write().await.write_count += 1;
    }

    async fn record_write_failure(&self) {
        self.stats.write().await.write_failure_count += 1;
        metrics::counter!("shell_cache_store_write_failures_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionTag;
    use bytes::Bytes;
    use shell_storage::MemoryStorage;

    fn manager() -> CacheManager {
        CacheManager::new(
            Arc::new(MemoryStorage::new()),
            Namespace::new("turbosign").unwrap(),
        )
    }

    fn handle(version: &str) -> StoreHandle {
        StoreHandle::new(
            Namespace::new("turbosign").unwrap(),
            VersionTag::new(version).unwrap(),
        )
    }

    fn ok(body: &'static str) -> CachedResponse {
        CachedResponse::new(200, vec![], Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn test_query_insensitive_lookup() {
        let cache = manager();
        let v1 = handle("v1");
        let opts = MatchOptions::default();

        cache.open(&v1).await.unwrap();
        cache
            .put(&v1, "GET", "/build/pdf.mjs?x=1", &ok("pdf"), opts)
            .await
            .unwrap();

        let found = cache.get(&v1, "GET", "/build/pdf.mjs?x=2", opts).await.unwrap();
        assert_eq!(found.unwrap().body.as_ref(), b"pdf");

        let stats = cache.stats().await;
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.write_count, 1);
    }

    #[tokio::test]
    async fn test_rejects_non_200() {
        let cache = manager();
        let v1 = handle("v1");
        cache.open(&v1).await.unwrap();

        let not_found = CachedResponse::new(404, vec![], Bytes::new());
        let err = cache
            .put(&v1, "GET", "/web/missing.svg", &not_found, MatchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::NotCacheable(404)));
        assert!(cache.entries(&v1).await.unwrap().is_empty());
        assert_eq!(cache.stats().await.write_failure_count, 1);
    }

    #[tokio::test]
    async fn test_list_handles_filters_namespace() {
        let store = Arc::new(MemoryStorage::new());
        let cache = CacheManager::new(store.clone(), Namespace::new("turbosign").unwrap());

        cache.open(&handle("v1")).await.unwrap();
        cache.open(&handle("v2")).await.unwrap();
        store.open("unrelated-v1").await.unwrap();

        let handles = cache.list_handles().await.unwrap();
        assert_eq!(handles, vec![handle("v1"), handle("v2")]);
    }

    #[tokio::test]
    async fn test_lookup_and_exists_leave_stats_alone() {
        let cache = manager();
        let v1 = handle("v1");
        let opts = MatchOptions::default();

        assert!(!cache.exists(&v1).await.unwrap());
        cache.open(&v1).await.unwrap();
        assert!(cache.exists(&v1).await.unwrap());

        cache.put(&v1, "GET", "/index.html", &ok("<html>"), opts).await.unwrap();

        assert!(cache.lookup(&v1, "GET", "/index.html", opts).await.unwrap().is_some());
        assert!(cache.lookup(&v1, "GET", "/missing", opts).await.unwrap().is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.hit_count, 0);
        assert_eq!(stats.miss_count, 0);
    }
}
