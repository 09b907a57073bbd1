//! Advisory read cache of [`ProductView`](crate::models::ProductView)s.
//!
//! Nothing may depend on the cache for correctness: callers log and swallow
//! write failures and treat read failures as misses.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache unavailable")]
    Unavailable,
}

pub fn product_cache_key(id: i64) -> String {
    format!("products:{id}")
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    /// Stores `value` without expiry.
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// Typed access on top of [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    async fn set_json<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw).await
    }

    /// A stored value that fails to decode is an error, which callers treat as a miss.
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Redis-backed cache: plain `SET`/`GET`/`DEL`, no TTL.
#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
}

impl RedisCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Process-local cache for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with [`CacheError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.check()?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}
