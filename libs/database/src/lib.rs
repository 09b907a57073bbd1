//! Connection helpers for the catalog's backing stores.
//!
//! # Features
//!
//! - `redis` (default) - read-cache connection manager
//! - `mongodb` - primary product store client
//! - `config` - `core_config::FromEnv` impls for the store configs
//!
//! ```ignore
//! use database::{mongodb, redis, common::RetryConfig};
//!
//! let retry = RetryConfig::new().with_max_retries(5);
//! let client = mongodb::connect_from_config_with_retry(&mongo_config, Some(retry.clone())).await?;
//! let cache = redis::connect_with_retry(&redis_config.url, Some(retry)).await?;
//! ```

pub mod common;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{DatabaseError, DatabaseResult};
