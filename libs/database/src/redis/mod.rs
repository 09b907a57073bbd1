//! Redis connection setup for the read cache.

mod config;
mod connector;

pub use config::RedisConfig;
pub use connector::{connect, connect_with_retry};

pub use redis::aio::ConnectionManager;
pub use redis::{AsyncCommands, RedisResult};
