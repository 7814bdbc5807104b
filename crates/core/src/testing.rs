//! Test doubles shared by the engine's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use url::Url;

use crate::Error;
use crate::cache::{CacheStorage, CacheStore, MemoryStorage};
use crate::http::{InterceptedRequest, Response};
use crate::network::Network;
use crate::worker::ServiceWorkerHost;

/// Scripted network: per-URL responses or failures, plus an offline switch.
#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, Option<Response>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), Some(response));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), None);
    }

    /// Hold fetches of `url` until the returned gate is notified.
    pub(crate) fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(url.to_string(), gate.clone());
        gate
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url().to_string();

        let gate = self.gates.lock().unwrap().get(&url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        match self.routes.lock().unwrap().get(&url) {
            Some(Some(response)) => Ok(response.clone()),
            _ => Err(Error::Network(format!("connection refused: {url}"))),
        }
    }
}

/// Host that only counts the capability calls it receives.
pub(crate) struct RecordingHost {
    origin: Url,
    skip_waiting: AtomicUsize,
    claims: AtomicUsize,
}

impl RecordingHost {
    pub(crate) fn new(origin: &str) -> Self {
        Self { origin: Url::parse(origin).unwrap(), skip_waiting: AtomicUsize::new(0), claims: AtomicUsize::new(0) }
    }

    pub(crate) fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn claim_calls(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ServiceWorkerHost for RecordingHost {
    fn origin(&self) -> &Url {
        &self.origin
    }

    async fn skip_waiting(&self) {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    async fn claim_clients(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory storage whose `delete` fails for selected cache names.
pub(crate) struct FlakyStorage {
    inner: MemoryStorage,
    failing: HashSet<String>,
}

impl FlakyStorage {
    pub(crate) fn new<'a>(inner: MemoryStorage, failing: impl IntoIterator<Item = &'a str>) -> Self {
        Self { inner, failing: failing.into_iter().map(str::to_string).collect() }
    }
}

#[async_trait::async_trait]
impl CacheStorage for FlakyStorage {
    async fn open_or_create(&self, name: &str) -> Result<Arc<dyn CacheStore>, Error> {
        self.inner.open_or_create(name).await
    }

    async fn open_existing(&self, name: &str) -> Result<Option<Arc<dyn CacheStore>>, Error> {
        self.inner.open_existing(name).await
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.inner.list_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.failing.contains(name) {
            return Err(Error::CacheMiss(format!("{name} is locked")));
        }
        self.inner.delete(name).await
    }
}
