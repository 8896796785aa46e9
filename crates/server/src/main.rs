//! copertine MCP server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use copertine_client::{HttpPreloader, StoreClient, StoreConfig};
use copertine_core::media::{LocalPreloader, SqliteMappingStore};
use copertine_core::{
    AppConfig, AssetPreloader, CacheDb, Clock, MediaResolver, MediaResolverConfig, PageCache, PageCacheConfig,
    SystemClock,
};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let policy = config.schedule_policy()?;
    tracing::info!(
        store_url = %config.store_url,
        collection = %config.collection,
        page_limit = config.page_limit,
        prefetch_pages = config.prefetch_pages,
        "Starting copertine server on stdio transport"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let store = Arc::new(StoreClient::new(StoreConfig::from(&config))?);

    let pages = PageCache::spawn(
        PageCacheConfig { page_limit: config.page_limit, prefetch_pages: config.prefetch_pages, policy },
        store.clone(),
        clock.clone(),
    )
    .await;

    let (media, queue) = MediaResolver::load(
        MediaResolverConfig { media_root: config.media_root.clone(), queue_capacity: config.prefetch_queue, policy },
        Arc::new(SqliteMappingStore::new(db.clone())),
        clock.clone(),
    )
    .await;

    let preloader: Arc<dyn AssetPreloader> = if config.media_is_remote() {
        Arc::new(HttpPreloader::with_timeout(config.timeout(), &config.user_agent)?)
    } else {
        Arc::new(LocalPreloader)
    };
    let _worker = media.spawn_worker(queue, pages.clone(), preloader);

    let state = Arc::new(AppState { config, policy, clock, db, pages, media, search: store });
    let server = serve_server(handler::CopertineServer::new(state), stdio()).await?;

    server.waiting().await?;

    Ok(())
}
