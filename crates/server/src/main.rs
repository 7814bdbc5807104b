//! offcache server entry point.
//!
//! Loads configuration, builds the asset manifest, registers a worker for the
//! current build and exposes it as an MCP server on stdio. Logging goes to
//! stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use offcache_client::{FetchClient, FetchConfig};
use offcache_core::config::StorageBackend;
use offcache_core::manifest::walk_static_dir;
use offcache_core::{AppConfig, AssetManifest, BuildVersion, CacheStorage, ManifestFile, MemoryStorage, SqliteStorage, WorkerRuntime};

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;
    let (version, manifest) = load_manifest(&config)?;

    tracing::info!(origin = %origin, version = %version, assets = manifest.len(), "starting offcache on stdio transport");

    let storage: Arc<dyn CacheStorage> = match config.storage {
        StorageBackend::Sqlite => Arc::new(SqliteStorage::open(&config.db_path).await?),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    let network = FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })?;

    let runtime = Arc::new(WorkerRuntime::new(origin, Arc::new(network)).with_install_concurrency(config.install_concurrency));
    let client = runtime.open_client().await;

    match runtime.register(version, Arc::new(manifest), storage.clone()).await {
        Ok(registration) => tracing::info!(
            version = %registration.version,
            state = ?registration.state,
            cached = registration.install.cached.len(),
            failed = registration.install.failed.len(),
            "worker registered"
        ),
        Err(e) => tracing::error!("worker registration failed, serving without a worker: {e}"),
    }

    let handler = handler::OffcacheServer::new(runtime, storage, client);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

/// Manifest file entries plus the walked static directory, and the build
/// version they belong to.
fn load_manifest(config: &AppConfig) -> Result<(BuildVersion, AssetManifest)> {
    let file = match &config.manifest_path {
        Some(path) => ManifestFile::load(path)?,
        None => ManifestFile::default(),
    };

    let mut files = file.files;
    if let Some(dir) = &config.static_dir {
        files.extend(walk_static_dir(dir)?);
    }

    let version = config.resolve_build_version(file.version.as_deref());
    Ok((version, AssetManifest::new(file.build, files)))
}
