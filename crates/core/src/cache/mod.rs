//! Named persistent caches.
//!
//! The engine talks to storage only through [`CacheStorage`] (the set of
//! named caches) and [`CacheStore`] (one named cache). Two backends ship:
//!
//! - [`MemoryStorage`]: process-local, used by tests and ephemeral hosts
//! - [`SqliteStorage`]: SQLite via tokio-rusqlite, with WAL mode, schema
//!   migrations and cascade deletes of a cache's entries
//!
//! Writes to the same key are last-write-wins in both backends.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::sync::Arc;

use crate::Error;
use crate::http::{InterceptedRequest, Response};

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// One named cache of request → response snapshots.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Name this store was opened with.
    fn name(&self) -> &str;

    /// Look up the stored response for `request`.
    async fn get(&self, request: &InterceptedRequest) -> Result<Option<Response>, Error>;

    /// Store `response` for `request`, replacing any previous entry.
    async fn put(&self, request: &InterceptedRequest, response: &Response) -> Result<(), Error>;

    /// Remove the entry for `request`. Returns whether one existed.
    async fn delete(&self, request: &InterceptedRequest) -> Result<bool, Error>;

    /// Request keys currently stored, oldest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;
}

/// The set of named caches.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the cache called `name`, creating it if absent.
    async fn open_or_create(&self, name: &str) -> Result<Arc<dyn CacheStore>, Error>;

    /// Open the cache called `name` if it exists. Never creates it.
    async fn open_existing(&self, name: &str) -> Result<Option<Arc<dyn CacheStore>>, Error>;

    /// Names of every existing cache, in creation order.
    async fn list_names(&self) -> Result<Vec<String>, Error>;

    /// Delete the cache called `name` with all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Whether a cache called `name` exists.
    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.list_names().await?.iter().any(|n| n == name))
    }
}
