//! Execution of routing decisions against the caches and the network.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::CacheStorage;
use crate::http::{InterceptedRequest, Response};
use crate::network::Network;
use crate::router::RoutingDecision;
use crate::version::BuildVersion;

/// Where a response handed back to the client came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Precached asset from the static cache.
    StaticCache,
    /// Fresh network response (and now stored in the offline cache).
    Network,
    /// Network failed; served from the offline cache.
    OfflineCache,
    /// Not intercepted; fetched directly by the host.
    Passthrough,
}

/// A response together with its provenance.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub response: Response,
    pub source: ResponseSource,
}

/// Cache-only for static assets, network-first with offline fallback for
/// everything else.
pub struct OfflineCacheProxy {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    version: BuildVersion,
}

impl OfflineCacheProxy {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, version: BuildVersion) -> Self {
        Self { storage, network, version }
    }

    /// Run `decision` for `request`. `Ok(None)` means the request is not
    /// intercepted and the host must fetch it itself.
    pub async fn execute(
        &self, request: &InterceptedRequest, decision: RoutingDecision,
    ) -> Result<Option<ProxiedResponse>, Error> {
        match decision {
            RoutingDecision::Bypass => Ok(None),
            RoutingDecision::ServeFromStaticCache => self.serve_static(request).await.map(Some),
            RoutingDecision::NetworkFirstWithFallback => self.network_first(request).await.map(Some),
        }
    }

    /// Serve from the static cache without touching the network.
    ///
    /// A miss means the cache drifted from the manifest; the request then
    /// goes network-first.
    pub async fn serve_static(&self, request: &InterceptedRequest) -> Result<ProxiedResponse, Error> {
        let cache_name = self.version.static_cache_name();

        match self.lookup(&cache_name, request).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %request.url(), "served from static cache");
                return Ok(ProxiedResponse { response, source: ResponseSource::StaticCache });
            }
            Ok(None) => tracing::warn!(url = %request.url(), cache = %cache_name, "static asset missing from cache"),
            Err(e) => tracing::warn!(url = %request.url(), cache = %cache_name, "static cache lookup failed: {e}"),
        }

        self.network_first(request).await
    }

    /// Fetch from the network, storing a copy in the offline cache; fall back
    /// to the offline cache when the network fails.
    ///
    /// With no fallback entry the original network error is returned as-is.
    pub async fn network_first(&self, request: &InterceptedRequest) -> Result<ProxiedResponse, Error> {
        let cache_name = self.version.offline_cache_name();

        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_offline(&cache_name, request, &response).await;
                Ok(ProxiedResponse { response, source: ResponseSource::Network })
            }
            Err(network_err) => {
                tracing::debug!(url = %request.url(), "network failed, trying offline cache: {network_err}");

                match self.lookup(&cache_name, request).await {
                    Ok(Some(response)) => {
                        tracing::debug!(url = %request.url(), "served from offline cache");
                        Ok(ProxiedResponse { response, source: ResponseSource::OfflineCache })
                    }
                    Ok(None) => Err(network_err),
                    Err(e) => {
                        tracing::warn!(url = %request.url(), cache = %cache_name, "offline cache lookup failed: {e}");
                        Err(network_err)
                    }
                }
            }
        }
    }

    /// Read `request` from an existing cache. A missing cache is a miss and
    /// is not created.
    async fn lookup(&self, cache_name: &str, request: &InterceptedRequest) -> Result<Option<Response>, Error> {
        match self.storage.open_existing(cache_name).await? {
            Some(cache) => cache.get(request).await,
            None => Ok(None),
        }
    }

    /// Store a copy of `response` in the offline cache. Failures only log;
    /// the caller still gets the network response.
    async fn store_offline(&self, cache_name: &str, request: &InterceptedRequest, response: &Response) {
        if response.is_partial() {
            tracing::debug!(url = %request.url(), "not storing partial response");
            return;
        }

        let result = match self.storage.open_or_create(cache_name).await {
            Ok(cache) => cache.put(request, response).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!(url = %request.url(), cache = %cache_name, "failed to store offline copy: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::testing::MockNetwork;
    use url::Url;

    fn request(url: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(url).unwrap())
    }

    fn proxy(storage: &Arc<MemoryStorage>, network: &Arc<MockNetwork>) -> OfflineCacheProxy {
        OfflineCacheProxy::new(storage.clone(), network.clone(), BuildVersion::new("1"))
    }

    #[tokio::test]
    async fn test_static_hit_makes_no_network_call() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        let req = request("https://app.example.com/app.js");
        storage
            .open_or_create("static-cache-1")
            .await
            .unwrap()
            .put(&req, &Response::new(200, "cached js"))
            .await
            .unwrap();

        let served = proxy(&storage, &network).serve_static(&req).await.unwrap();

        assert_eq!(served.source, ResponseSource::StaticCache);
        assert_eq!(served.response.text_lossy(), "cached js");
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_miss_falls_through_to_network() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        network.respond("https://app.example.com/app.js", Response::new(200, "fresh js"));
        let req = request("https://app.example.com/app.js");

        let served = proxy(&storage, &network).serve_static(&req).await.unwrap();

        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(network.calls(), 1);
        let offline = storage.open_or_create("offline-cache-1").await.unwrap();
        assert!(offline.get(&req).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_network_success_is_stored_offline() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        network.respond("https://app.example.com/api/data", Response::new(200, "X"));
        let req = request("https://app.example.com/api/data");

        let served = proxy(&storage, &network).network_first(&req).await.unwrap();

        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.response.text_lossy(), "X");
        let stored = storage
            .open_or_create("offline-cache-1")
            .await
            .unwrap()
            .get(&req)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, served.response);
    }

    #[tokio::test]
    async fn test_network_failure_uses_offline_copy() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        let req = request("https://app.example.com/api/data");
        let proxy = proxy(&storage, &network);

        network.respond("https://app.example.com/api/data", Response::new(201, "first").with_header("X-Id", "7"));
        let online = proxy.network_first(&req).await.unwrap();

        network.set_offline(true);
        let offline = proxy.network_first(&req).await.unwrap();

        assert_eq!(offline.source, ResponseSource::OfflineCache);
        assert_eq!(offline.response.status(), online.response.status());
        assert_eq!(offline.response.body(), online.response.body());
        assert_eq!(offline.response.headers().get("x-id"), Some("7"));
    }

    #[tokio::test]
    async fn test_network_failure_without_fallback_propagates() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        network.fail("https://app.example.com/api/data");
        let req = request("https://app.example.com/api/data");

        let result = proxy(&storage, &network).network_first(&req).await;

        match result {
            Err(Error::Network(msg)) => assert!(msg.contains("app.example.com/api/data")),
            other => panic!("expected the network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_returned_and_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        network.respond("https://app.example.com/missing", Response::new(404, "nope"));
        let req = request("https://app.example.com/missing");

        let served = proxy(&storage, &network).network_first(&req).await.unwrap();

        assert_eq!(served.response.status(), 404);
        let offline = storage.open_or_create("offline-cache-1").await.unwrap();
        assert!(offline.get(&req).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_partial_response_not_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        network.respond("https://app.example.com/video", Response::new(206, "part"));
        let req = request("https://app.example.com/video");

        let served = proxy(&storage, &network).network_first(&req).await.unwrap();

        assert_eq!(served.response.status(), 206);
        let offline = storage.open_or_create("offline-cache-1").await.unwrap();
        assert!(offline.get(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_miss_leaves_evicted_caches_gone() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        storage.open_or_create("static-cache-2").await.unwrap();
        storage.open_or_create("offline-cache-2").await.unwrap();
        network.set_offline(true);
        let req = request("https://app.example.com/app.js");

        let result = proxy(&storage, &network).serve_static(&req).await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(storage.list_names().await.unwrap(), vec!["static-cache-2", "offline-cache-2"]);
    }

    #[tokio::test]
    async fn test_execute_bypass_does_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::new());
        let req = request("https://app.example.com/api");

        let result = proxy(&storage, &network).execute(&req, RoutingDecision::Bypass).await.unwrap();

        assert!(result.is_none());
        assert_eq!(network.calls(), 0);
        assert!(storage.list_names().await.unwrap().is_empty());
    }
}
