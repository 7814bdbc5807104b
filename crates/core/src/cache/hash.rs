//! Stable entry keys for the SQLite backend.

use sha2::{Digest, Sha256};

/// Hash a request key (`InterceptedRequest::cache_key`) into a fixed-width
/// primary key, so long URLs don't bloat the index.
pub fn compute_cache_key(request_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request_key.as_bytes());
    hex::encode(hasher.finalize())
}
