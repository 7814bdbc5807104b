//! Install and activate handlers.
//!
//! ### Install
//! - Open `static-cache-<version>` and precache every manifest entry.
//! - Each asset is fetched and stored on its own. A failure is logged and
//!   recorded in the report; it never aborts the others and is not retried.
//! - Once every asset has settled, ask the host to skip waiting.
//!
//! ### Activate
//! - Delete every cache not owned by the current version. Deletions are
//!   independent: one failing does not stop the rest.
//! - Make sure both current caches exist, then claim open clients.

use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::{CacheStorage, CacheStore};
use crate::http::InterceptedRequest;
use crate::manifest::AssetManifest;
use crate::network::Network;
use crate::version::BuildVersion;
use crate::worker::ServiceWorkerHost;

/// Default number of assets fetched concurrently during install.
pub const DEFAULT_INSTALL_CONCURRENCY: usize = 8;

/// An asset that could not be precached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AssetFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of an install.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub cache_name: String,
    pub cached: Vec<String>,
    pub failed: Vec<AssetFailure>,
}

/// A stale cache that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EvictionFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of an activation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub kept: Vec<String>,
    pub evicted: Vec<String>,
    pub failed: Vec<EvictionFailure>,
}

/// Owns the static cache population and stale cache eviction for one version.
pub struct CacheLifecycleManager {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    manifest: Arc<AssetManifest>,
    version: BuildVersion,
    origin: Url,
    install_concurrency: usize,
}

impl CacheLifecycleManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, manifest: Arc<AssetManifest>,
        version: BuildVersion, origin: Url,
    ) -> Self {
        Self { storage, network, manifest, version, origin, install_concurrency: DEFAULT_INSTALL_CONCURRENCY }
    }

    /// Bound the number of in-flight precache fetches. Zero is treated as one.
    pub fn with_install_concurrency(mut self, concurrency: usize) -> Self {
        self.install_concurrency = concurrency.max(1);
        self
    }

    /// Populate the static cache, then signal skip-waiting.
    ///
    /// Only failing to open the static cache fails the install; individual
    /// assets are best effort.
    pub async fn on_install(&self, host: &dyn ServiceWorkerHost) -> Result<InstallReport, Error> {
        let cache_name = self.version.static_cache_name();
        let cache = self.storage.open_or_create(&cache_name).await?;
        let cache: &dyn CacheStore = cache.as_ref();

        tracing::info!(
            version = %self.version,
            cache = %cache_name,
            assets = self.manifest.len(),
            "installing worker"
        );

        let results: Vec<(String, Result<(), Error>)> = futures::stream::iter(self.manifest.iter())
            .map(|path| async move { (path.to_string(), self.precache(cache, path).await) })
            .buffer_unordered(self.install_concurrency)
            .collect()
            .await;

        let mut report = InstallReport { cache_name, ..Default::default() };
        for (path, result) in results {
            match result {
                Ok(()) => report.cached.push(path),
                Err(source) => {
                    let err = Error::AssetPopulation { path: path.clone(), source: Box::new(source) };
                    tracing::warn!(version = %self.version, "{err}");
                    report.failed.push(AssetFailure { path, reason: err.to_string() });
                }
            }
        }

        tracing::info!(
            version = %self.version,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "precache finished"
        );

        host.skip_waiting().await;

        Ok(report)
    }

    async fn precache(&self, cache: &dyn CacheStore, path: &str) -> Result<(), Error> {
        let url = self
            .origin
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        let request = InterceptedRequest::get(url);

        let response = self.network.fetch(&request).await?;
        if !response.is_success() {
            return Err(Error::HttpStatus(format!("status {}", response.status())));
        }

        cache.put(&request, &response).await
    }

    /// Evict every stale cache, then claim open clients.
    ///
    /// Returns only after every deletion has settled.
    pub async fn on_activate(&self, host: &dyn ServiceWorkerHost) -> Result<ActivateReport, Error> {
        let names = self.storage.list_names().await?;
        let mut report = ActivateReport::default();

        for name in names {
            if self.version.owns(&name) {
                report.kept.push(name);
                continue;
            }

            match self.storage.delete(&name).await {
                Ok(_) => {
                    tracing::debug!(version = %self.version, cache = %name, "evicted stale cache");
                    report.evicted.push(name);
                }
                Err(source) => {
                    let err = Error::CacheEviction { name: name.clone(), source: Box::new(source) };
                    tracing::warn!(version = %self.version, "{err}");
                    report.failed.push(EvictionFailure { name, reason: err.to_string() });
                }
            }
        }

        for name in [self.version.static_cache_name(), self.version.offline_cache_name()] {
            if report.kept.contains(&name) {
                continue;
            }
            match self.storage.open_or_create(&name).await {
                Ok(_) => report.kept.push(name),
                Err(e) => tracing::warn!(version = %self.version, cache = %name, "failed to create cache: {e}"),
            }
        }

        tracing::info!(
            version = %self.version,
            evicted = report.evicted.len(),
            failed = report.failed.len(),
            "activated worker"
        );

        host.claim_clients().await;

        Ok(report)
    }
}
