use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::common::{RetryConfig, retry, retry_with_backoff};

/// Opens a reconnecting [`ConnectionManager`] and checks it with `PING`.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    info!("Connecting to Redis");

    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// [`connect`] under a backoff policy; `None` uses the default one.
pub async fn connect_with_retry(
    url: &str,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    match retry_config {
        Some(policy) => retry_with_backoff(|| connect(url), policy).await,
        None => retry(|| connect(url)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires actual Redis
    async fn test_connect() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        assert!(connect(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let result =
            connect_with_retry("definitely not a url", Some(RetryConfig::new().with_max_retries(0)))
                .await;
        assert!(result.is_err());
    }
}
