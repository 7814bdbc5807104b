//! cache_get tool implementation.
//!
//! Retrieves the entry stored for a request in one named cache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use offcache_core::http::parse_url;
use offcache_core::{CacheStorage, Error, InterceptedRequest};

use crate::tools::{ResponseView, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Name of the cache, e.g. `static-cache-1700000000000`.
    pub cache: String,

    /// Request URL. Paths are resolved against the worker's origin.
    pub url: String,

    /// Request method the entry was stored under.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub cache: String,
    /// Key the entry is stored under.
    pub key: String,
    pub response: ResponseView,
}

/// Implementation of the cache_get tool.
///
/// Never creates the cache it is asked about.
pub async fn get_impl(
    storage: &dyn CacheStorage, origin: &Url, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let Some(cache) = storage.open_existing(&params.cache).await? else {
        return Err(Error::CacheMiss(format!("no cache named {}", params.cache)).into());
    };

    let url = parse_url(&params.url, Some(origin))?;
    let request = InterceptedRequest::new(&params.method, url);
    let key = request.cache_key();

    let response = cache
        .get(&request)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{key} in {}", params.cache)))?;

    json_result(&CacheGetOutput { cache: params.cache, key, response: ResponseView::from(&response) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output;
    use offcache_core::{MemoryStorage, Response};

    fn origin() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    fn params(cache: &str, url: &str) -> CacheGetParams {
        CacheGetParams { cache: cache.into(), url: url.into(), method: default_method() }
    }

    #[tokio::test]
    async fn test_get_impl_unknown_cache() {
        let storage = MemoryStorage::new();

        let result = get_impl(&storage, &origin(), params("static-cache-1", "/app.js")).await;
        assert!(result.is_err());
        assert!(storage.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_impl_missing_entry() {
        let storage = MemoryStorage::new();
        storage.open_or_create("static-cache-1").await.unwrap();

        let result = get_impl(&storage, &origin(), params("static-cache-1", "/app.js")).await;
        let err = result.unwrap_err();
        assert!(err.message.starts_with("CACHE_MISS"));
    }

    #[tokio::test]
    async fn test_get_impl_found_by_path() {
        let storage = MemoryStorage::new();
        let req = InterceptedRequest::get(origin().join("/app.js").unwrap());
        storage
            .open_or_create("static-cache-1")
            .await
            .unwrap()
            .put(&req, &Response::new(200, "console.log(1)").with_header("Content-Type", "text/javascript"))
            .await
            .unwrap();

        let result = get_impl(&storage, &origin(), params("static-cache-1", "/app.js")).await.unwrap();
        let out: CacheGetOutput = output(&result);

        assert_eq!(out.key, "https://app.example.com/app.js");
        assert_eq!(out.response.status, 200);
        assert_eq!(out.response.body, "console.log(1)");
        assert_eq!(out.response.content_type.as_deref(), Some("text/javascript"));
    }
}
