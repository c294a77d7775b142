//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{CacheStore, validate_store_name};
use crate::error::StorageError;
use crate::record::{self, CacheKey, CachedResponse};

/// Extension of committed record files
const RECORD_EXTENSION: &str = "rec";

/// Local disk storage backend
///
/// Stores records in one directory per store:
/// `<base_path>/stores/<store>/<key digest>.rec`
pub struct LocalStorage {
    stores_path: PathBuf,
    quota_bytes: Option<u64>,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let stores_path = base_path.as_ref().join("stores");

        fs::create_dir_all(&stores_path).await?;

        info!("Initialized local storage at {:?}", stores_path);

        Ok(Self {
            stores_path,
            quota_bytes: None,
        })
    }

    /// Limit every store to `quota_bytes` of encoded records
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn store_path(&self, store: &str) -> Result<PathBuf, StorageError> {
        validate_store_name(store)?;
        Ok(self.stores_path.join(store))
    }

    fn record_path(&self, store: &str, key: &CacheKey) -> Result<PathBuf, StorageError> {
        Ok(self
            .store_path(store)?
            .join(format!("{}.{}", key.digest(), RECORD_EXTENSION)))
    }

    /// Committed record files of a store
    async fn record_files(&self, store: &str) -> Result<Vec<PathBuf>, StorageError> {
        let path = self.store_path(store)?;
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn ensure_quota(
        &self,
        store: &str,
        record_path: &Path,
        incoming: u64,
    ) -> Result<(), StorageError> {
        let Some(limit) = self.quota_bytes else {
            return Ok(());
        };

        let current = self.size(store).await?;
        let replaced = match fs::metadata(record_path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        let required = current.saturating_sub(replaced) + incoming;
        if required > limit {
            return Err(StorageError::QuotaExceeded {
                store: store.to_string(),
                required,
                limit,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl CacheStore for LocalStorage {
    async fn open(&self, store: &str) -> Result<(), StorageError> {
        let path = self.store_path(store)?;
        debug!("Opening store at {:?}", path);
        fs::create_dir_all(&path).await?;
        Ok(())
    }

    async fn exists(&self, store: &str) -> Result<bool, StorageError> {
        let path = self.store_path(store)?;
        Ok(fs::metadata(&path).await.is_ok_and(|m| m.is_dir()))
    }

    async fn get(
        &self,
        store: &str,
        key: &CacheKey,
    ) -> Result<Option<CachedResponse>, StorageError> {
        let path = self.record_path(store, key)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let (stored_key, response) = record::decode(Bytes::from(data))?;
        if &stored_key != key {
            // Digest collision or a record copied between stores
            warn!("Record at {:?} holds {}, expected {}", path, stored_key, key);
            return Ok(None);
        }

        Ok(Some(response))
    }

    async fn put(
        &self,
        store: &str,
        key: &CacheKey,
        response: &CachedResponse,
    ) -> Result<(), StorageError> {
        let dir = self.store_path(store)?;
        if !self.exists(store).await? {
            return Err(StorageError::NotFound(store.to_string()));
        }

        let path = self.record_path(store, key)?;
        let data = record::encode(key, response)?;
        self.ensure_quota(store, &path, data.len() as u64).await?;

        debug!("Writing record {} to {:?}", key, path);

        // Write atomically using a temp file
        let temp_path = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(())
    }

    async fn delete(&self, store: &str) -> Result<bool, StorageError> {
        let path = self.store_path(store)?;
        debug!("Deleting store at {:?}", path);

        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.stores_path).await?;
        let mut stores = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_store_name(name).is_ok()
            {
                stores.push(name.to_string());
            }
        }

        stores.sort();
        Ok(stores)
    }

    async fn keys(&self, store: &str) -> Result<Vec<CacheKey>, StorageError> {
        let mut keys = Vec::new();
        for path in self.record_files(store).await? {
            let data = fs::read(&path).await?;
            match record::decode_key(&data) {
                Ok(key) => keys.push(key),
                Err(e) => warn!("Skipping unreadable record {:?}: {}", path, e),
            }
        }

        keys.sort_by(|a, b| a.url().cmp(b.url()).then(a.method().cmp(b.method())));
        Ok(keys)
    }

    async fn size(&self, store: &str) -> Result<u64, StorageError> {
        let mut total = 0u64;
        for path in self.record_files(store).await? {
            if let Ok(meta) = fs::metadata(&path).await {
                total += meta.len();
            }
        }
        Ok(total)
    }
}
