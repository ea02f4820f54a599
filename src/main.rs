use std::sync::Arc;

use content_workflow_manager::{
    config::Config,
    search::TantivyIndex,
    store::create_store,
    sync::{init_sync_metrics, SyncScheduler},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("content_workflow_manager={}", config.observability.log_level).into()
    });
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting content workflow manager"
    );

    if config.observability.prometheus_enabled {
        init_sync_metrics();
        tracing::info!("Prometheus metrics initialized");
    }

    // System-of-record and audit sink
    let (store, _audit) = create_store(&config.store)?;

    // Full-text index
    let index = Arc::new(TantivyIndex::new(config.search.clone())?);
    tracing::info!(index_path = ?config.search.index_path, "Search index opened");

    // Background index synchronization
    let scheduler = Arc::new(SyncScheduler::new(
        store.clone(),
        index.clone(),
        config.sync.clone(),
    ));
    let handle = if config.sync.enabled {
        Some(scheduler.clone().start())
    } else {
        tracing::warn!("Sync scheduler disabled by configuration");
        None
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    scheduler.shutdown();
    if let Some(handle) = handle {
        handle.await?;
    }

    Ok(())
}
