//! In-process host for service workers.
//!
//! `WorkerRuntime` plays the part a browser plays for a real service worker:
//! it runs install and activate (awaiting each hook before moving the worker
//! on), keeps at most one active and one waiting worker, tracks open client
//! sessions and which version controls them, and dispatches fetches.
//!
//! ```text
//! Installing -> Installed -> Activating -> Activated
//!      \                                      |
//!       `-> Redundant  <--- replaced by a newer activation
//! ```
//!
//! A newer version installs while the current one keeps serving; it only
//! takes over once its own activation has completed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::Error;
use crate::cache::CacheStorage;
use crate::http::InterceptedRequest;
use crate::lifecycle::{ActivateReport, DEFAULT_INSTALL_CONCURRENCY, InstallReport};
use crate::manifest::AssetManifest;
use crate::network::Network;
use crate::proxy::{ProxiedResponse, ResponseSource};
use crate::version::BuildVersion;
use crate::worker::{FetchOutcome, ServiceWorker, ServiceWorkerHost};

/// Identifier of an open client session (a page, a tab, a connection).
pub type ClientId = u64;

/// Lifecycle state of one worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

type Clients = Arc<RwLock<BTreeMap<ClientId, Option<BuildVersion>>>>;

/// Host-side capabilities handed to one worker.
struct WorkerHandle {
    origin: Url,
    version: BuildVersion,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    clients: Clients,
}

impl WorkerHandle {
    fn new(origin: Url, version: BuildVersion, clients: Clients) -> Self {
        Self {
            origin,
            version,
            state: RwLock::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
            clients,
        }
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
        tracing::debug!(version = %self.version, ?state, "worker state changed");
    }

    async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ServiceWorkerHost for WorkerHandle {
    fn origin(&self) -> &Url {
        &self.origin
    }

    async fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
        tracing::debug!(version = %self.version, "skip waiting requested");
    }

    async fn claim_clients(&self) {
        let mut clients = self.clients.write().await;
        for controller in clients.values_mut() {
            *controller = Some(self.version.clone());
        }
        tracing::info!(version = %self.version, clients = clients.len(), "claimed clients");
    }
}

#[derive(Clone)]
struct Registered {
    worker: Arc<ServiceWorker>,
    handle: Arc<WorkerHandle>,
}

impl Registered {
    async fn info(&self) -> WorkerInfo {
        WorkerInfo {
            version: self.handle.version.clone(),
            state: self.handle.state().await,
            assets: self.worker.manifest().len(),
        }
    }
}

#[derive(Default)]
struct Slots {
    active: Option<Registered>,
    waiting: Option<Registered>,
}

/// Result of registering a worker.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Registration {
    pub version: BuildVersion,
    /// `Activated`, or `Installed` if the worker is waiting for the current
    /// one to release its clients.
    pub state: WorkerState,
    pub install: InstallReport,
    pub activate: Option<ActivateReport>,
}

/// Summary of one worker for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerInfo {
    pub version: BuildVersion,
    pub state: WorkerState,
    pub assets: usize,
}

/// Snapshot of the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RuntimeStatus {
    pub origin: String,
    pub active: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub clients: usize,
    pub controlled_clients: usize,
}

/// In-process service worker host.
pub struct WorkerRuntime {
    origin: Url,
    network: Arc<dyn Network>,
    install_concurrency: usize,
    clients: Clients,
    slots: RwLock<Slots>,
    registrations: Mutex<()>,
    transition: Mutex<()>,
    next_client: AtomicU64,
}

impl WorkerRuntime {
    pub fn new(origin: Url, network: Arc<dyn Network>) -> Self {
        Self {
            origin,
            network,
            install_concurrency: DEFAULT_INSTALL_CONCURRENCY,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            slots: RwLock::new(Slots::default()),
            registrations: Mutex::new(()),
            transition: Mutex::new(()),
            next_client: AtomicU64::new(1),
        }
    }

    pub fn with_install_concurrency(mut self, concurrency: usize) -> Self {
        self.install_concurrency = concurrency.max(1);
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Install a worker for `version` and, if it asked to skip waiting or
    /// nothing is active yet, activate it.
    ///
    /// A failed install leaves the worker redundant and the current active
    /// worker untouched. Registrations run one at a time in call order, so a
    /// later build is never replaced by an earlier one that installed slowly.
    pub async fn register(
        &self, version: BuildVersion, manifest: Arc<AssetManifest>, storage: Arc<dyn CacheStorage>,
    ) -> Result<Registration, Error> {
        let _queued = self.registrations.lock().await;
        let handle = Arc::new(WorkerHandle::new(self.origin.clone(), version.clone(), self.clients.clone()));
        let worker = ServiceWorker::new(version.clone(), manifest, storage, self.network.clone(), handle.clone())
            .with_install_concurrency(self.install_concurrency);
        let registered = Registered { worker: Arc::new(worker), handle };

        let install = match registered.worker.on_install().await {
            Ok(report) => report,
            Err(e) => {
                registered.handle.set_state(WorkerState::Redundant).await;
                tracing::warn!(version = %version, "install failed: {e}");
                return Err(Error::WorkerRedundant(format!("{version}: {e}")));
            }
        };
        registered.handle.set_state(WorkerState::Installed).await;

        Ok(self.settle(registered, install).await)
    }

    /// Decide between activating an installed worker now and parking it.
    async fn settle(&self, registered: Registered, install: InstallReport) -> Registration {
        let _transition = self.transition.lock().await;
        let version = registered.handle.version.clone();

        let has_active = self.slots.read().await.active.is_some();
        if has_active && !registered.handle.skip_waiting_requested() {
            let replaced = self.slots.write().await.waiting.replace(registered);
            if let Some(previous) = replaced {
                previous.handle.set_state(WorkerState::Redundant).await;
            }
            tracing::info!(version = %version, "worker installed, waiting");
            return Registration { version, state: WorkerState::Installed, install, activate: None };
        }

        let activate = self.activate(registered).await;
        Registration { version, state: WorkerState::Activated, install, activate: Some(activate) }
    }

    /// Run the activate hook and promote the worker. Callers hold `transition`.
    async fn activate(&self, registered: Registered) -> ActivateReport {
        registered.handle.set_state(WorkerState::Activating).await;

        let report = match registered.worker.on_activate().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(version = %registered.handle.version, "activate handler failed: {e}");
                ActivateReport::default()
            }
        };

        registered.handle.set_state(WorkerState::Activated).await;

        let (previous, superseded) = {
            let mut slots = self.slots.write().await;
            (slots.active.replace(registered), slots.waiting.take())
        };
        for old in previous.into_iter().chain(superseded) {
            old.handle.set_state(WorkerState::Redundant).await;
        }

        report
    }

    /// Promote the waiting worker, if any.
    pub async fn activate_waiting(&self) -> Option<ActivateReport> {
        let _transition = self.transition.lock().await;
        let waiting = self.slots.write().await.waiting.take()?;
        Some(self.activate(waiting).await)
    }

    /// Open a client session. It is controlled by the active worker, if any.
    pub async fn open_client(&self) -> ClientId {
        let id = self.next_client.fetch_add(1, Ordering::SeqCst);
        let controller = self
            .slots
            .read()
            .await
            .active
            .as_ref()
            .map(|r| r.handle.version.clone());
        self.clients.write().await.insert(id, controller);
        id
    }

    /// Close a client session.
    ///
    /// Once no client is controlled by the active worker, a waiting worker
    /// takes over.
    pub async fn close_client(&self, id: ClientId) -> Option<ActivateReport> {
        self.clients.write().await.remove(&id);

        let active_version = {
            let slots = self.slots.read().await;
            slots.waiting.as_ref()?;
            slots.active.as_ref().map(|r| r.handle.version.clone())
        };

        let still_controlled = self
            .clients
            .read()
            .await
            .values()
            .any(|controller| controller.is_some() && *controller == active_version);
        if still_controlled {
            return None;
        }

        self.activate_waiting().await
    }

    /// Version controlling client `id`, if any.
    pub async fn controller(&self, id: ClientId) -> Option<BuildVersion> {
        self.clients.read().await.get(&id).cloned().flatten()
    }

    /// Active worker, if any.
    pub async fn active_worker(&self) -> Option<Arc<ServiceWorker>> {
        self.slots.read().await.active.as_ref().map(|r| r.worker.clone())
    }

    /// Dispatch `request` to the active worker; fetch it directly when no
    /// worker is active or the worker lets it pass through.
    pub async fn fetch(&self, request: &InterceptedRequest) -> Result<ProxiedResponse, Error> {
        if let Some(worker) = self.active_worker().await
            && let FetchOutcome::Respond(served) = worker.on_fetch(request).await?
        {
            return Ok(served);
        }

        self.passthrough(request).await
    }

    /// Fetch on behalf of client `id`. Uncontrolled clients bypass the worker.
    pub async fn fetch_for_client(&self, id: ClientId, request: &InterceptedRequest) -> Result<ProxiedResponse, Error> {
        if self.controller(id).await.is_some() { self.fetch(request).await } else { self.passthrough(request).await }
    }

    async fn passthrough(&self, request: &InterceptedRequest) -> Result<ProxiedResponse, Error> {
        let response = self.network.fetch(request).await?;
        Ok(ProxiedResponse { response, source: ResponseSource::Passthrough })
    }

    pub async fn status(&self) -> RuntimeStatus {
        let (active, waiting) = {
            let slots = self.slots.read().await;
            (slots.active.clone(), slots.waiting.clone())
        };

        let (clients, controlled_clients) = {
            let clients = self.clients.read().await;
            (clients.len(), clients.values().filter(|c| c.is_some()).count())
        };

        RuntimeStatus {
            origin: self.origin.to_string(),
            active: match active {
                Some(r) => Some(r.info().await),
                None => None,
            },
            waiting: match waiting {
                Some(r) => Some(r.info().await),
                None => None,
            },
            clients,
            controlled_clients,
        }
    }
}
