//! cache_list tool implementation.
//!
//! Lists every named cache with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offcache_core::{BuildVersion, CacheStorage};

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
    /// Whether the cache belongs to the active worker's version.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub caches: Vec<CacheSummary>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(
    storage: &dyn CacheStorage, active: Option<&BuildVersion>,
) -> Result<CallToolResult, McpError> {
    let mut caches = Vec::new();

    for name in storage.list_names().await? {
        // Deleted between listing and opening.
        let Some(cache) = storage.open_existing(&name).await? else { continue };
        let entries = cache.keys().await?.len();
        let current = active.is_some_and(|version| version.owns(&name));
        caches.push(CacheSummary { name, entries, current });
    }

    json_result(&CacheListOutput { caches })
}
