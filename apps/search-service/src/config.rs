//! Configuration for the search service

use core_config::{app_info, server::ServerConfig, AppInfo, FromEnv};
use domain_search::ElasticsearchConfig;
use event_bus::AmqpConfig;

pub use core_config::Environment;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub elasticsearch: ElasticsearchConfig,
    pub amqp: AmqpConfig,
    pub server: ServerConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        Ok(Self {
            app: app_info!(),
            elasticsearch: ElasticsearchConfig::from_env()?,
            amqp: AmqpConfig::from_env()?.with_consumer_tag("search-indexer"),
            server: ServerConfig::from_env()?,
            environment: Environment::from_env(),
        })
    }
}
