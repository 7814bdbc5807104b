//! Network transport for offcache.
//!
//! This crate provides the reqwest-based implementation of
//! [`offcache_core::network::Network`] used by the server.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig};
