//! MCP server handler implementation.
//!
//! One MCP session is one client of the worker runtime: requests made through
//! `web_fetch` are controlled by whichever worker has claimed that client.
use std::sync::Arc;

use crate::tools::{CacheGetParams, WebFetchParams, fetch_impl, get_impl, list_impl, status_impl};

use offcache_core::{CacheStorage, ClientId, WorkerRuntime};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    runtime: Arc<WorkerRuntime>,
    storage: Arc<dyn CacheStorage>,
    client: ClientId,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OffcacheServer {
    /// Create a handler serving `client` of `runtime`.
    pub fn new(runtime: Arc<WorkerRuntime>, storage: Arc<dyn CacheStorage>, client: ClientId) -> Self {
        Self { runtime, storage, client, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Fetch a URL through the offline caching worker. Static assets are served from the precache; other same-origin GET requests go to the network first and fall back to the offline cache. Returns the response and where it came from."
    )]
    async fn web_fetch(&self, params: Parameters<WebFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.runtime, self.client, params.0).await
    }

    #[tool(description = "List every cache with its entry count and whether it belongs to the active worker.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        let active = self.runtime.active_worker().await;
        list_impl(self.storage.as_ref(), active.as_ref().map(|w| w.version())).await
    }

    #[tool(description = "Show the entry stored for a request in one cache.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.storage.as_ref(), self.runtime.origin(), params.0).await
    }

    #[tool(description = "Report the active and waiting workers, their versions and states, and controlled clients.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.runtime).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
