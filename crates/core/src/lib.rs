//! Core engine for offcache, an offline caching layer in front of a web app.
//!
//! This crate provides:
//! - Request classification against a precached asset manifest
//! - Versioned cache storage with in-memory and SQLite backends
//! - Install/activate lifecycle and the fetch strategies of a service worker
//! - An in-process host runtime that drives workers through their lifecycle
//! - Unified error types and layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod manifest;
pub mod network;
pub mod proxy;
pub mod router;
pub mod runtime;
pub mod version;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheStorage, CacheStore, MemoryStorage, SqliteStorage};
pub use config::AppConfig;
pub use error::Error;
pub use http::{CacheMode, Headers, InterceptedRequest, Response};
pub use lifecycle::{ActivateReport, CacheLifecycleManager, InstallReport};
pub use manifest::{AssetManifest, ManifestFile};
pub use network::Network;
pub use proxy::{OfflineCacheProxy, ProxiedResponse, ResponseSource};
pub use router::{RoutingDecision, classify};
pub use runtime::{ClientId, RuntimeStatus, WorkerRuntime, WorkerState};
pub use version::BuildVersion;
pub use worker::{FetchOutcome, ServiceWorker, ServiceWorkerHost};
