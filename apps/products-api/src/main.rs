//! Products API - catalog writes and cached reads over REST

use axum_helpers::server::{create_production_app, create_router, health_router, ShutdownCoordinator};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_products::{MongoProductRepository, ProductService, RedisCache};
use event_bus::AmqpEventBus;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to MongoDB at {}", config.mongodb.url());
    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb, None).await?;
    let db = mongo_client.database(config.mongodb.database());
    info!(
        "Successfully connected to MongoDB database: {}",
        config.mongodb.database()
    );

    let repository = MongoProductRepository::new(&db);
    repository.init_indexes().await?;

    let redis = database::redis::connect_with_retry(config.redis.url(), None).await?;
    let bus = Arc::new(AmqpEventBus::connect(&config.amqp).await?);

    let service = ProductService::new(
        repository,
        Arc::new(RedisCache::new(redis)),
        bus.clone(),
        config.amqp.exchange.clone(),
    );

    let app = create_router(api::routes(service.clone())).merge(health_router(config.app));

    let coordinator = ShutdownCoordinator::new();
    tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.wait_for_signal().await }
    });

    info!("Starting Products API on port {}", config.server.port);

    create_production_app(
        app,
        &config.server,
        coordinator,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: draining pending invalidations and events");
            service.flush_background().await;
            bus.close().await;
            drop(mongo_client);
            info!("Connections closed");
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Products API shutdown complete");
    Ok(())
}
