//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store not found: {0}")]
    NotFound(String),

    #[error("Invalid store name: {0}")]
    InvalidStoreName(String),

    #[error("Quota exceeded for store {store}: {required} bytes required, limit is {limit}")]
    QuotaExceeded {
        store: String,
        required: u64,
        limit: u64,
    },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
