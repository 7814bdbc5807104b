//! The worker engine: lifecycle hooks and fetch handling for one build.
//!
//! The engine never reaches for global state. Everything it needs from its
//! environment comes through an injected [`ServiceWorkerHost`], and each hook
//! returns a future the host awaits before completing the matching
//! transition. That await is the wait-until contract: the host must not move
//! the worker on while a hook is pending.

use std::sync::Arc;

use url::Url;

use crate::Error;
use crate::cache::CacheStorage;
use crate::http::InterceptedRequest;
use crate::lifecycle::{ActivateReport, CacheLifecycleManager, InstallReport};
use crate::manifest::AssetManifest;
use crate::network::Network;
use crate::proxy::{OfflineCacheProxy, ProxiedResponse};
use crate::router::{RoutingDecision, classify};
use crate::version::BuildVersion;

/// Capabilities a host grants to the worker it runs.
#[async_trait::async_trait]
pub trait ServiceWorkerHost: Send + Sync {
    /// Location the worker was registered for.
    fn origin(&self) -> &Url;

    /// Activate as soon as install completes instead of waiting for the
    /// current worker to release its clients.
    async fn skip_waiting(&self);

    /// Become the controller of every open client session.
    async fn claim_clients(&self);
}

/// Result of the fetch hook.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the host should fetch the request normally.
    Passthrough,
    /// The worker produced a response.
    Respond(ProxiedResponse),
}

/// One worker instance, bound to a single build version.
pub struct ServiceWorker {
    version: BuildVersion,
    manifest: Arc<AssetManifest>,
    origin: Url,
    host: Arc<dyn ServiceWorkerHost>,
    lifecycle: CacheLifecycleManager,
    proxy: OfflineCacheProxy,
}

impl ServiceWorker {
    pub fn new(
        version: BuildVersion, manifest: Arc<AssetManifest>, storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>, host: Arc<dyn ServiceWorkerHost>,
    ) -> Self {
        let origin = host.origin().clone();
        let lifecycle = CacheLifecycleManager::new(
            storage.clone(),
            network.clone(),
            manifest.clone(),
            version.clone(),
            origin.clone(),
        );
        let proxy = OfflineCacheProxy::new(storage, network, version.clone());

        Self { version, manifest, origin, host, lifecycle, proxy }
    }

    pub fn with_install_concurrency(mut self, concurrency: usize) -> Self {
        self.lifecycle = self.lifecycle.with_install_concurrency(concurrency);
        self
    }

    pub fn version(&self) -> &BuildVersion {
        &self.version
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Routing decision for `request`, without executing it.
    pub fn classify(&self, request: &InterceptedRequest) -> RoutingDecision {
        classify(request, &self.manifest, &self.origin)
    }

    /// Install hook: precache the manifest and ask to skip waiting.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        self.lifecycle.on_install(self.host.as_ref()).await
    }

    /// Activate hook: evict stale caches and claim clients.
    pub async fn on_activate(&self) -> Result<ActivateReport, Error> {
        self.lifecycle.on_activate(self.host.as_ref()).await
    }

    /// Fetch hook: classify the request and run the chosen strategy.
    pub async fn on_fetch(&self, request: &InterceptedRequest) -> Result<FetchOutcome, Error> {
        let decision = self.classify(request);
        tracing::debug!(
            version = %self.version,
            method = request.method(),
            url = %request.url(),
            ?decision,
            "fetch event"
        );

        match self.proxy.execute(request, decision).await? {
            Some(served) => Ok(FetchOutcome::Respond(served)),
            None => Ok(FetchOutcome::Passthrough),
        }
    }
}
