//! Build versions and the cache names derived from them.
//!
//! The `<kind>-<version>` layout is the only persisted state the engine
//! relies on: activation compares names against it to tell current caches
//! from stale ones.

use std::fmt;

use serde::{Deserialize, Serialize};

const STATIC_PREFIX: &str = "static-cache-";
const OFFLINE_PREFIX: &str = "offline-cache-";

/// Opaque identifier of one build/deploy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct BuildVersion(String);

impl BuildVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Version derived from the current wall clock, in Unix milliseconds.
    ///
    /// Used when neither the configuration nor the manifest names a build.
    pub fn from_timestamp() -> Self {
        Self(chrono::Utc::now().timestamp_millis().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the cache holding this build's precached assets.
    pub fn static_cache_name(&self) -> String {
        format!("{STATIC_PREFIX}{}", self.0)
    }

    /// Name of the cache holding this build's opportunistic responses.
    pub fn offline_cache_name(&self) -> String {
        format!("{OFFLINE_PREFIX}{}", self.0)
    }

    /// Whether `name` is one of the two caches owned by this version.
    pub fn owns(&self, name: &str) -> bool {
        name == self.static_cache_name() || name == self.offline_cache_name()
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildVersion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
