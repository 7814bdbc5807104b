//! In-memory cache storage.
//!
//! Uses tokio RwLocks around insertion-ordered maps so `list_names` and
//! `keys` report creation order like the SQLite backend.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::{CacheStorage, CacheStore};
use crate::Error;
use crate::http::{InterceptedRequest, Response};

/// Process-local [`CacheStorage`]. Clones share the same caches.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    caches: Arc<RwLock<IndexMap<String, Arc<MemoryStore>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One in-memory named cache.
pub struct MemoryStore {
    name: String,
    entries: RwLock<IndexMap<String, Response>>,
}

impl MemoryStore {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), entries: RwLock::new(IndexMap::new()) }
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, request: &InterceptedRequest) -> Result<Option<Response>, Error> {
        let entries = self.entries.read().await;
        Ok(entries.get(&request.cache_key()).cloned())
    }

    async fn put(&self, request: &InterceptedRequest, response: &Response) -> Result<(), Error> {
        let key = request.cache_key();
        let mut entries = self.entries.write().await;
        // Re-inserting moves the key to the back, keeping `keys` oldest-first.
        entries.shift_remove(&key);
        entries.insert(key, response.clone());
        Ok(())
    }

    async fn delete(&self, request: &InterceptedRequest) -> Result<bool, Error> {
        let mut entries = self.entries.write().await;
        Ok(entries.shift_remove(&request.cache_key()).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let entries = self.entries.read().await;
        Ok(entries.keys().cloned().collect())
    }
}

#[async_trait::async_trait]
impl CacheStorage for MemoryStorage {
    async fn open_or_create(&self, name: &str) -> Result<Arc<dyn CacheStore>, Error> {
        {
            let caches = self.caches.read().await;
            if let Some(store) = caches.get(name) {
                let store: Arc<dyn CacheStore> = store.clone();
                return Ok(store);
            }
        }

        let mut caches = self.caches.write().await;
        let store: Arc<dyn CacheStore> = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new(name)))
            .clone();
        Ok(store)
    }

    async fn open_existing(&self, name: &str) -> Result<Option<Arc<dyn CacheStore>>, Error> {
        let caches = self.caches.read().await;
        Ok(caches.get(name).map(|store| store.clone() as Arc<dyn CacheStore>))
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        let caches = self.caches.read().await;
        Ok(caches.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut caches = self.caches.write().await;
        Ok(caches.shift_remove(name).is_some())
    }
}
