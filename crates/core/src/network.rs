//! Network capability consumed by the engine.

use crate::Error;
use crate::http::{InterceptedRequest, Response};

/// Transport that performs real fetches on behalf of the engine.
///
/// Any HTTP status is a successful fetch; only transport-level failures
/// (offline, DNS, TLS, refused connections) are errors. Timeouts belong to
/// the implementation.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error>;
}
