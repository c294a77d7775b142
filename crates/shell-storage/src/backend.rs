//! Cache store backend trait

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{CacheKey, CachedResponse};

/// Cache store backend trait
///
/// A backend holds named stores. Each store is a keyed response map with
/// overwrite-on-put semantics. Backends never inspect response status; callers
/// decide what is cacheable.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the store if it does not exist yet
    async fn open(&self, store: &str) -> Result<(), StorageError>;

    /// Check whether a store exists
    async fn exists(&self, store: &str) -> Result<bool, StorageError>;

    /// Read a record. A missing store reads as empty.
    async fn get(&self, store: &str, key: &CacheKey)
    -> Result<Option<CachedResponse>, StorageError>;

    /// Write a record atomically, replacing any record with the same key
    async fn put(
        &self,
        store: &str,
        key: &CacheKey,
        response: &CachedResponse,
    ) -> Result<(), StorageError>;

    /// Remove a whole store with all of its records
    async fn delete(&self, store: &str) -> Result<bool, StorageError>;

    /// List every store name held by the backend
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    /// List the keys held by a store
    async fn keys(&self, store: &str) -> Result<Vec<CacheKey>, StorageError>;

    /// Total encoded size of a store in bytes
    async fn size(&self, store: &str) -> Result<u64, StorageError>;
}

/// Validate a store name before it is used as a path component
pub fn validate_store_name(store: &str) -> Result<(), StorageError> {
    if store.is_empty() || store.len() > 128 {
        return Err(StorageError::InvalidStoreName(format!(
            "Store name must be 1-128 characters: {:?}",
            store
        )));
    }

    if store.starts_with('.') {
        return Err(StorageError::InvalidStoreName(format!(
            "Store name must not start with '.': {}",
            store
        )));
    }

    if !store
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StorageError::InvalidStoreName(format!(
            "Store name contains invalid characters: {}",
            store
        )));
    }

    Ok(())
}
