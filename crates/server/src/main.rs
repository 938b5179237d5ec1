//! sparkcache server entry point.
//!
//! Boots the caching proxy from configuration, runs its install and activate
//! steps, then serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sparkcache_client::{CachingProxy, FetchConfig, HttpFetcher, ProxyConfig};
use sparkcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

/// Install, then activate if the new version does not have to wait.
///
/// A failed install leaves whatever an earlier version stored in place; the
/// server still starts so the host can retry through `sw_install`.
async fn boot(proxy: &CachingProxy) {
    match proxy.on_install().await {
        Ok(report) if report.ready => {
            if let Err(e) = proxy.on_activate().await {
                tracing::error!(error = %e, "activation failed");
            }
        }
        Ok(_) => tracing::info!("installed, waiting for SKIP_WAITING"),
        Err(e) => tracing::error!(error = %e, "install failed at startup"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        static_cache = %config.static_cache,
        runtime_cache = %config.runtime_cache,
        db_path = %config.db_path.display(),
        "Starting sparkcache server on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path).await?;
    let fetcher = HttpFetcher::new(FetchConfig::from_app_config(&config))?;
    let proxy = Arc::new(CachingProxy::new(
        ProxyConfig::from_app_config(&config)?,
        Arc::new(cache.clone()),
        Arc::new(fetcher),
    )?);

    boot(&proxy).await;

    let handler = handler::SparkCacheServer::new(Arc::clone(&proxy), cache);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    proxy.tasks().wait_idle().await;

    Ok(())
}
