//! Request classification.
//!
//! `classify` decides, for every request the host sees, whether the engine
//! intercepts it and which strategy applies. It is pure: the decision depends
//! only on the request, the manifest and the worker's origin.
//!
//! Predicates, in order:
//! 1. non-GET or byte-range requests bypass
//! 2. non-http(s) schemes (`data:`, `blob:` ...) bypass
//! 3. same hostname on a different port (a dev server) bypasses
//! 4. a static asset is a same-host request whose path is in the manifest
//! 5. `only-if-cached` requests bypass unless they target a static asset
//! 6. static assets are served from cache, everything else network-first

use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{CacheMode, InterceptedRequest};
use crate::manifest::AssetManifest;

/// What the engine does with one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Not intercepted; the host fetches it normally.
    Bypass,
    /// Precached asset; served from the static cache.
    ServeFromStaticCache,
    /// Fetched from the network, with the offline cache as fallback.
    NetworkFirstWithFallback,
}

impl RoutingDecision {
    pub fn is_intercepted(&self) -> bool {
        !matches!(self, RoutingDecision::Bypass)
    }
}

/// Classify `request` for a worker serving `origin` with `manifest`.
pub fn classify(request: &InterceptedRequest, manifest: &AssetManifest, origin: &Url) -> RoutingDecision {
    if !request.is_get() || request.has_range() {
        return RoutingDecision::Bypass;
    }

    let url = request.url();

    if !matches!(url.scheme(), "http" | "https") {
        return RoutingDecision::Bypass;
    }

    if is_dev_server_request(url, origin) {
        return RoutingDecision::Bypass;
    }

    let is_static_asset = same_host(url, origin) && manifest.contains(url.path());

    if !is_static_asset && request.cache_mode() == CacheMode::OnlyIfCached {
        return RoutingDecision::Bypass;
    }

    if is_static_asset { RoutingDecision::ServeFromStaticCache } else { RoutingDecision::NetworkFirstWithFallback }
}

/// Same hostname as the origin but a different port.
///
/// Default ports compare as absent, so `http://site` and `http://site:80`
/// are the same port.
fn is_dev_server_request(url: &Url, origin: &Url) -> bool {
    url.host_str() == origin.host_str() && url.port() != origin.port()
}

/// Hostname and port both match the origin.
fn same_host(url: &Url, origin: &Url) -> bool {
    url.host_str() == origin.host_str() && url.port() == origin.port()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    fn manifest() -> AssetManifest {
        AssetManifest::new(["/app.js", "/app.css"], ["/favicon.png"])
    }

    fn get(url: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_static_asset_served_from_cache() {
        let decision = classify(&get("https://app.example.com/app.js"), &manifest(), &origin());
        assert_eq!(decision, RoutingDecision::ServeFromStaticCache);
    }

    #[test]
    fn test_dynamic_request_is_network_first() {
        let decision = classify(&get("https://app.example.com/api/data"), &manifest(), &origin());
        assert_eq!(decision, RoutingDecision::NetworkFirstWithFallback);
    }

    #[test]
    fn test_static_file_with_space_in_name() {
        let manifest = AssetManifest::new(Vec::<String>::new(), ["/my logo.png"]);
        let decision = classify(&get("https://app.example.com/my%20logo.png"), &manifest, &origin());
        assert_eq!(decision, RoutingDecision::ServeFromStaticCache);
    }

    #[test]
    fn test_cross_origin_manifest_path_is_not_static() {
        let decision = classify(&get("https://cdn.example.com/app.js"), &manifest(), &origin());
        assert_eq!(decision, RoutingDecision::NetworkFirstWithFallback);
    }

    #[test]
    fn test_non_get_always_bypasses() {
        let url = Url::parse("https://app.example.com/app.js").unwrap();
        for method in ["POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"] {
            for mode in [CacheMode::Default, CacheMode::OnlyIfCached, CacheMode::ForceCache] {
                let request = InterceptedRequest::new(method, url.clone()).with_cache_mode(mode);
                assert_eq!(classify(&request, &manifest(), &origin()), RoutingDecision::Bypass);
            }
        }
    }

    #[test]
    fn test_range_request_always_bypasses() {
        for url in ["https://app.example.com/app.js", "https://app.example.com/video.mp4", "https://other.org/"] {
            let request = get(url).with_header("Range", "bytes=0-1023");
            assert_eq!(classify(&request, &manifest(), &origin()), RoutingDecision::Bypass);
        }
    }

    #[test]
    fn test_non_http_schemes_bypass() {
        for url in ["data:text/plain,hello", "blob:https://app.example.com/1234", "file:///etc/hosts"] {
            assert_eq!(classify(&get(url), &manifest(), &origin()), RoutingDecision::Bypass);
        }
    }

    #[test]
    fn test_http_scheme_is_intercepted() {
        let origin = Url::parse("http://localhost:3000").unwrap();
        let decision = classify(&get("http://localhost:3000/app.js"), &manifest(), &origin);
        assert_eq!(decision, RoutingDecision::ServeFromStaticCache);
    }

    #[test]
    fn test_dev_server_port_bypasses_regardless_of_manifest() {
        let origin = Url::parse("http://localhost:3000").unwrap();
        for path in ["/app.js", "/api/data", "/@vite/client"] {
            let request = get(&format!("http://localhost:5173{path}"));
            assert_eq!(classify(&request, &manifest(), &origin), RoutingDecision::Bypass);
        }
    }

    #[test]
    fn test_default_port_is_not_a_dev_server() {
        let decision = classify(&get("https://app.example.com:443/app.js"), &manifest(), &origin());
        assert_eq!(decision, RoutingDecision::ServeFromStaticCache);
    }

    #[test]
    fn test_only_if_cached_static_asset_is_served() {
        let request = get("https://app.example.com/app.css").with_cache_mode(CacheMode::OnlyIfCached);
        assert_eq!(classify(&request, &manifest(), &origin()), RoutingDecision::ServeFromStaticCache);
    }

    #[test]
    fn test_only_if_cached_dynamic_request_bypasses() {
        for url in ["https://app.example.com/api/data", "https://cdn.example.com/app.js"] {
            let request = get(url).with_cache_mode(CacheMode::OnlyIfCached);
            assert_eq!(classify(&request, &manifest(), &origin()), RoutingDecision::Bypass);
        }
    }

    #[test]
    fn test_query_string_does_not_affect_membership() {
        let decision = classify(&get("https://app.example.com/app.js?v=2"), &manifest(), &origin());
        assert_eq!(decision, RoutingDecision::ServeFromStaticCache);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let requests = [
            get("https://app.example.com/app.js"),
            get("https://app.example.com/api").with_cache_mode(CacheMode::OnlyIfCached),
            get("http://app.example.com:8080/app.js"),
            InterceptedRequest::new("POST", Url::parse("https://app.example.com/form").unwrap()),
        ];
        let manifest = manifest();
        for request in &requests {
            let first = classify(request, &manifest, &origin());
            for _ in 0..10 {
                assert_eq!(classify(request, &manifest, &origin()), first);
            }
        }
    }

    #[test]
    fn test_empty_manifest_disables_static_serving() {
        let empty = AssetManifest::default();
        let decision = classify(&get("https://app.example.com/app.js"), &empty, &origin());
        assert_eq!(decision, RoutingDecision::NetworkFirstWithFallback);
    }
}
