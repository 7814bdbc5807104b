//! Unified error types for offcache.
//!
//! Every message carries a stable upper-case code prefix so hosts can match
//! on it without depending on the enum.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the offcache engine and its hosts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., unknown cache mode).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Request URL could not be parsed.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The network rejected the fetch (connection refused, DNS, TLS, offline...).
    ///
    /// When the offline cache has no fallback entry this is the final outcome
    /// returned to the caller, unchanged.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// The network answered, but not with a usable status.
    #[error("HTTP_ERROR: {0}")]
    HttpStatus(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(String),

    /// Manifest file or static directory could not be read.
    #[error("MANIFEST_ERROR: {0}")]
    Manifest(String),

    /// A single asset failed to fetch or store during install.
    #[error("ASSET_POPULATION_FAILED: {path}: {source}")]
    AssetPopulation {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// A stale cache could not be deleted during activation.
    #[error("CACHE_EVICTION_FAILED: {name}: {source}")]
    CacheEviction {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// The worker failed to install and was discarded by its host.
    #[error("WORKER_REDUNDANT: {0}")]
    WorkerRedundant(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) | Error::InvalidUrl(_) => -32602,
            Error::Network(_) => -32008,
            Error::FetchTooLarge(_) => -32007,
            Error::HttpStatus(_) => -32009,
            Error::CacheMiss(_) => -32001,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => -32002,
            Error::Manifest(_) => -32003,
            Error::AssetPopulation { .. } => -32004,
            Error::CacheEviction { .. } => -32005,
            Error::WorkerRedundant(_) => -32006,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
