//! shellcache server entry point.
//!
//! Boots one proxy version from the layered config and serves its lifecycle
//! events as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{CacheVersion, ClientRegistry, FetchConfig, HttpFetcher, Manifest, OfflineCacheProxy};
use shellcache_core::{AppConfig, CacheStorage};
use tracing_subscriber::EnvFilter;
use url::Url;

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
    let origin = Url::parse(&config.origin)?;
    let version = CacheVersion::from_config(&config);

    tracing::info!(version = %version, origin = %origin, db = %config.db_path.display(), "Starting shellcache on stdio transport");

    let storage = CacheStorage::open(&config.db_path).await?;
    let fetcher = HttpFetcher::new(FetchConfig::from(&config), origin.clone())?;
    let manifest = Manifest::from_config(&config)?;

    let proxy = Arc::new(OfflineCacheProxy::new(
        version,
        manifest,
        storage,
        Arc::new(fetcher),
        ClientRegistry::new(),
    ));

    let handler = handler::ShellcacheServer::new(Arc::clone(&proxy), origin);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    proxy.flush_writes().await;
    tracing::info!(failed_writes = proxy.write_failures(), "shut down");

    Ok(())
}
