//! worker_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};

use offcache_core::WorkerRuntime;

use crate::tools::json_result;

/// Report the active and waiting workers and how many clients they control.
pub async fn status_impl(runtime: &WorkerRuntime) -> Result<CallToolResult, McpError> {
    json_result(&runtime.status().await)
}
