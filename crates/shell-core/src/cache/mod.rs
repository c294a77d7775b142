//! Cache management module

mod manager;

pub use manager::{CacheManager, CacheStats, MatchOptions};
