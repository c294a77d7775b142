//! Shell Cache Network Layer
//!
//! This crate provides the [`Fetcher`] abstraction the cache uses to reach
//! the network, and the `reqwest` based client that forwards in-scope
//! requests to the origin server.

pub mod client;
pub mod error;
pub mod fetch;

pub use client::{OriginClient, OriginClientConfig};
pub use error::ProxyError;
pub use fetch::{Fetcher, NetworkRequest, NetworkResponse};
