//! In-memory storage backend

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use crate::backend::{CacheStore, validate_store_name};
use crate::error::StorageError;
use crate::record::{CacheKey, CachedResponse, encoded_len};

type Records = HashMap<CacheKey, CachedResponse>;

/// In-memory storage backend
///
/// Contents are lost when the process exits. Used for ephemeral deployments
/// and tests.
#[derive(Default)]
pub struct MemoryStorage {
    stores: RwLock<HashMap<String, Records>>,
    quota_bytes: Option<u64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit every store to `quota_bytes` of encoded records
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn store_size(records: &Records) -> u64 {
        records.iter().map(|(k, v)| encoded_len(k, v)).sum()
    }
}

#[async_trait]
impl CacheStore for MemoryStorage {
    async fn open(&self, store: &str) -> Result<(), StorageError> {
        validate_store_name(store)?;
        self.stores.write().entry(store.to_string()).or_default();
        Ok(())
    }

    async fn exists(&self, store: &str) -> Result<bool, StorageError> {
        validate_store_name(store)?;
        Ok(self.stores.read().contains_key(store))
    }

    async fn get(
        &self,
        store: &str,
        key: &CacheKey,
    ) -> Result<Option<CachedResponse>, StorageError> {
        validate_store_name(store)?;
        Ok(self
            .stores
            .read()
            .get(store)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn put(
        &self,
        store: &str,
        key: &CacheKey,
        response: &CachedResponse,
    ) -> Result<(), StorageError> {
        validate_store_name(store)?;
        let mut stores = self.stores.write();
        let records = stores
            .get_mut(store)
            .ok_or_else(|| StorageError::NotFound(store.to_string()))?;

        if let Some(limit) = self.quota_bytes {
            let replaced = records.get(key).map(|r| encoded_len(key, r)).unwrap_or(0);
            let required =
                Self::store_size(records).saturating_sub(replaced) + encoded_len(key, response);
            if required > limit {
                return Err(StorageError::QuotaExceeded {
                    store: store.to_string(),
                    required,
                    limit,
                });
            }
        }

        debug!("Writing record {} to memory store {}", key, store);
        records.insert(key.clone(), response.clone());
        Ok(())
    }

    async fn delete(&self, store: &str) -> Result<bool, StorageError> {
        validate_store_name(store)?;
        Ok(self.stores.write().remove(store).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut stores: Vec<String> = self.stores.read().keys().cloned().collect();
        stores.sort();
        Ok(stores)
    }

    async fn keys(&self, store: &str) -> Result<Vec<CacheKey>, StorageError> {
        validate_store_name(store)?;
        let mut keys: Vec<CacheKey> = self
            .stores
            .read()
            .get(store)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default();

        keys.sort_by(|a, b| a.url().cmp(b.url()).then(a.method().cmp(b.method())));
        Ok(keys)
    }

    async fn size(&self, store: &str) -> Result<u64, StorageError> {
        validate_store_name(store)?;
        Ok(self
            .stores
            .read()
            .get(store)
            .map(Self::store_size)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let storage = MemoryStorage::new();
        let key = CacheKey::new("GET", "/index.html", true);
        let response = CachedResponse::new(200, vec![], Bytes::from_static(b"v1"));

        storage.open("s-v1").await.unwrap();
        storage.open("s-v2").await.unwrap();
        storage.put("s-v1", &key, &response).await.unwrap();

        assert!(storage.get("s-v1", &key).await.unwrap().is_some());
        assert!(storage.get("s-v2", &key).await.unwrap().is_none());

        assert!(storage.delete("s-v1").await.unwrap());
        assert_eq!(storage.list().await.unwrap(), vec!["s-v2"]);
    }

    #[tokio::test]
    async fn test_quota() {
        let storage = MemoryStorage::new().with_quota(Some(100));
        let key = CacheKey::new("GET", "/big.bin", true);
        let response = CachedResponse::new(200, vec![], Bytes::from(vec![0u8; 200]));

        storage.open("s-v1").await.unwrap();
        let err = storage.put("s-v1", &key, &response).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(storage.size("s-v1").await.unwrap(), 0);
    }
}
