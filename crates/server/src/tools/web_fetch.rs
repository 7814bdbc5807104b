//! web_fetch tool implementation.
//!
//! Routes a request through the active worker exactly as a controlled page
//! would: static assets come from the static cache, other same-origin GETs
//! go network-first with the offline cache as fallback, and everything else
//! is fetched directly.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offcache_core::http::parse_url;
use offcache_core::{CacheMode, ClientId, InterceptedRequest, ResponseSource, RoutingDecision, WorkerRuntime};

use crate::error::ToolError;
use crate::tools::{ResponseView, json_result};

/// Input parameters for web_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebFetchParams {
    /// Absolute URL, or a path resolved against the worker's origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers, e.g. `{"Range": "bytes=0-99"}`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Cache-mode hint. `only-if-cached` skips the worker unless the URL is a
    /// precached static asset.
    #[serde(default)]
    pub cache_mode: CacheMode,

    /// Request body. Not allowed for GET or HEAD.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for web_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebFetchOutput {
    /// Normalized request URL.
    pub url: String,
    /// How the worker classified the request; absent when no worker
    /// controls the session.
    pub decision: Option<RoutingDecision>,
    pub source: ResponseSource,
    pub response: ResponseView,
}

/// Implementation of the web_fetch tool.
pub async fn fetch_impl(
    runtime: &WorkerRuntime, client: ClientId, params: WebFetchParams,
) -> Result<CallToolResult, McpError> {
    let method = params.method.trim();
    if method.is_empty() {
        return Err(ToolError::InvalidInput("method must not be empty".into()).into());
    }
    if params.body.is_some() && (method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")) {
        return Err(ToolError::InvalidInput(format!("{method} requests cannot have a body")).into());
    }

    let url = parse_url(&params.url, Some(runtime.origin()))?;
    let mut request = InterceptedRequest::new(method, url)
        .with_headers(params.headers.into_iter().collect())
        .with_cache_mode(params.cache_mode);
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let decision = match runtime.controller(client).await {
        Some(_) => runtime.active_worker().await.map(|worker| worker.classify(&request)),
        None => None,
    };

    let served = runtime.fetch_for_client(client, &request).await?;

    json_result(&WebFetchOutput {
        url: request.url().to_string(),
        decision,
        source: served.source,
        response: ResponseView::from(&served.response),
    })
}
