//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offcache server.

pub mod cache;
pub mod web_fetch;
pub mod worker_status;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offcache_core::Response;

use crate::error::ToolError;

pub use cache::{CacheGetParams, get_impl, list_impl};
pub use web_fetch::{WebFetchParams, fetch_impl};
pub use worker_status::status_impl;

/// A single response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeaderView {
    pub name: String,
    pub value: String,
}

/// JSON view of a response, shared by the fetch and cache tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    pub status: u16,
    /// Final URL after redirects, when known.
    pub url: Option<String>,
    pub content_type: Option<String>,
    pub headers: Vec<HeaderView>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_bytes: usize,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status(),
            url: response.url().map(str::to_string),
            content_type: response.content_type().map(str::to_string),
            headers: response
                .headers()
                .iter()
                .map(|(name, value)| HeaderView { name: name.to_string(), value: value.to_string() })
                .collect(),
            body: response.text_lossy(),
            body_bytes: response.body().len(),
        }
    }
}

/// Encode `output` as the pretty JSON text content of a successful result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::Serialization(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
