//! site-cache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sitecache_client::{ApiClient, ApiConfig};
use sitecache_core::{AppConfig, SiteCache};
use tracing_subscriber::EnvFilter;

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
    tracing::info!(
        upstream = %config.upstream_base_url,
        snapshot_dir = %config.snapshot_dir.display(),
        refresh_interval_secs = config.refresh_interval_secs,
        forget_interval_secs = config.forget_interval_secs,
        "Starting site-cache server on stdio transport"
    );

    let client = ApiClient::new(ApiConfig::from(&config))?;
    let cache = SiteCache::from_config(&config, Arc::new(client));

    let handler = handler::SiteCacheServer::new(cache, Arc::new(config));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
