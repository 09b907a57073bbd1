//! Search Service - keeps the search index in step with product events
//! and serves product search over REST

use axum_helpers::server::{create_production_app, create_router, health_router, ShutdownCoordinator};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_search::{ElasticsearchIndex, SearchIndexer};
use event_bus::AmqpEventBus;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod metrics;
mod openapi;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);
    let metrics_handle = metrics::init_metrics()?;

    info!("Connecting to Elasticsearch at {}", config.elasticsearch.url);
    let index = Arc::new(ElasticsearchIndex::new(config.elasticsearch.clone())?);
    index.ensure_index().await?;

    let bus = Arc::new(AmqpEventBus::connect(&config.amqp).await?);
    let subscription = bus.subscribe(&config.amqp).await?;

    let coordinator = ShutdownCoordinator::new();
    tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.wait_for_signal().await }
    });

    let indexer = SearchIndexer::new(index.clone(), config.amqp.queue.clone());
    let indexer_handle = tokio::spawn({
        let coordinator = coordinator.clone();
        let shutdown = coordinator.subscribe();
        async move {
            indexer.run(subscription, shutdown).await;
            // A dead consumer leaves the index stale; take the process down with it.
            coordinator.shutdown();
        }
    });

    let app = create_router(api::routes(index))
        .merge(health_router(config.app))
        .merge(metrics::router(metrics_handle));

    info!(
        "Starting Search Service on port {}, consuming '{}'",
        config.server.port, config.amqp.queue
    );

    create_production_app(
        app,
        &config.server,
        coordinator,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: waiting for the indexer to settle its last message");
            if let Err(e) = indexer_handle.await {
                tracing::error!("Indexer task failed: {}", e);
            }
            bus.close().await;
            info!("Broker connection closed");
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Search Service shutdown complete");
    Ok(())
}
