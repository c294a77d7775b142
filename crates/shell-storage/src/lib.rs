//! Shell Cache Storage Layer
//!
//! This crate provides the keyed response store behind the offline cache,
//! with local disk and in-memory backends. A backend holds any number of
//! named stores; each store maps a [`CacheKey`] to a [`CachedResponse`].

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;
pub mod record;

pub use backend::{CacheStore, validate_store_name};
pub use error::StorageError;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use record::{CacheKey, CachedResponse};
