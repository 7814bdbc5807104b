//! [`CacheStorage`] over the SQLite cache database.

use std::path::Path;
use std::sync::Arc;

use super::connection::CacheDb;
use super::{CacheStorage, CacheStore};
use crate::Error;
use crate::http::{InterceptedRequest, Response};

/// Durable storage: every named cache is a row in `caches`, every stored
/// response a row in `entries`.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    db: CacheDb,
}

impl SqliteStorage {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }

    /// Open (or create) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::new(CacheDb::open(path).await?))
    }

    pub async fn open_in_memory() -> Result<Self, Error> {
        Ok(Self::new(CacheDb::open_in_memory().await?))
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }
}

struct SqliteStore {
    db: CacheDb,
    name: String,
}

#[async_trait::async_trait]
impl CacheStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, request: &InterceptedRequest) -> Result<Option<Response>, Error> {
        let entry = self.db.get_entry(&self.name, &request.cache_key()).await?;
        Ok(entry.map(|e| e.into_response()))
    }

    async fn put(&self, request: &InterceptedRequest, response: &Response) -> Result<(), Error> {
        self.db.upsert_entry(&self.name, &request.cache_key(), response).await
    }

    async fn delete(&self, request: &InterceptedRequest) -> Result<bool, Error> {
        self.db.delete_entry(&self.name, &request.cache_key()).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.db.list_entry_keys(&self.name).await
    }
}

#[async_trait::async_trait]
impl CacheStorage for SqliteStorage {
    async fn open_or_create(&self, name: &str) -> Result<Arc<dyn CacheStore>, Error> {
        self.db.create_cache(name).await?;
        Ok(Arc::new(SqliteStore { db: self.db.clone(), name: name.to_string() }))
    }

    async fn open_existing(&self, name: &str) -> Result<Option<Arc<dyn CacheStore>>, Error> {
        if !self.db.cache_exists(name).await? {
            return Ok(None);
        }
        let store: Arc<dyn CacheStore> = Arc::new(SqliteStore { db: self.db.clone(), name: name.to_string() });
        Ok(Some(store))
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.db.list_caches().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.db.delete_cache(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_storage_roundtrip() {
        let storage = SqliteStorage::open_in_memory().await.unwrap();
        let store = storage.open_or_create("offline-cache-9").await.unwrap();
        assert_eq!(store.name(), "offline-cache-9");

        let request = InterceptedRequest::get(Url::parse("https://example.com/api/data").unwrap());
        store.put(&request, &Response::new(200, "X")).await.unwrap();

        let found = store.get(&request).await.unwrap().unwrap();
        assert_eq!(found.text_lossy(), "X");
        assert_eq!(store.keys().await.unwrap(), vec!["https://example.com/api/data"]);
    }

    #[tokio::test]
    async fn test_storage_delete_removes_name() {
        let storage = SqliteStorage::open_in_memory().await.unwrap();
        storage.open_or_create("static-cache-1").await.unwrap();
        storage.open_or_create("static-cache-2").await.unwrap();

        assert!(storage.delete("static-cache-1").await.unwrap());
        assert_eq!(storage.list_names().await.unwrap(), vec!["static-cache-2"]);
        assert!(storage.has("static-cache-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_existing_does_not_create() {
        let storage = SqliteStorage::open_in_memory().await.unwrap();
        assert!(storage.open_existing("offline-cache-1").await.unwrap().is_none());
        assert!(storage.list_names().await.unwrap().is_empty());

        storage.open_or_create("offline-cache-1").await.unwrap();
        storage.delete("offline-cache-1").await.unwrap();
        assert!(storage.open_existing("offline-cache-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_after_delete_fails() {
        let storage = SqliteStorage::open_in_memory().await.unwrap();
        let store = storage.open_or_create("offline-cache-1").await.unwrap();
        storage.delete("offline-cache-1").await.unwrap();

        let request = InterceptedRequest::get(Url::parse("https://example.com/").unwrap());
        let result = store.put(&request, &Response::new(200, "late")).await;
        assert!(matches!(result, Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let request = InterceptedRequest::get(Url::parse("https://example.com/app.js").unwrap());

        {
            let storage = SqliteStorage::open(&path).await.unwrap();
            let store = storage.open_or_create("static-cache-1").await.unwrap();
            store.put(&request, &Response::new(200, "js")).await.unwrap();
        }

        let storage = SqliteStorage::open(&path).await.unwrap();
        assert_eq!(storage.list_names().await.unwrap(), vec!["static-cache-1"]);
        let store = storage.open_or_create("static-cache-1").await.unwrap();
        assert!(store.get(&request).await.unwrap().is_some());
    }
}
