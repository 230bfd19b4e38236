//! catsync server: one-way catalog replication from a source store into an
//! ad catalog, plus CSV feed generation and a webhook-driven incremental
//! path.

mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use catsync_ads::AdsClient;
use catsync_engine::{SyncEngine, WebhookProcessor};
use catsync_store::StoreClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = catsync_core::load_app_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();
    tracing::info!(?config, "configuration loaded");

    let pool = catsync_db::connect(&config.cache_path).await?;
    tracing::info!(path = %config.cache_path.display(), "cache ready");

    let store = StoreClient::new(
        &config.store_base_url,
        &config.store_key,
        &config.store_secret,
        config.request_timeout_secs,
    )?;
    let ads = AdsClient::new(
        &config.ads_base_url,
        &config.catalog_id,
        &config.catalog_token,
        config.request_timeout_secs,
    )?;

    let config = Arc::new(config);
    let engine = Arc::new(SyncEngine::new(
        store,
        ads,
        pool.clone(),
        config.mapper_config(),
    ));
    let webhooks = WebhookProcessor::new(
        Arc::clone(&engine),
        config.webhook_secret.clone(),
        config.store_host(),
    );

    let app = api::build_app(api::AppState {
        pool,
        engine,
        webhooks,
        config: Arc::clone(&config),
    });

    // Replication runs take minutes; the listener applies no idle or
    // per-request deadline that could cut one off.
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
