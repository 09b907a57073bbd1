#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_first};

/// Connection settings for the read cache.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// `redis://[user:pass@]host:port[/db]`
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

/// `REDIS_URL`, falling back to `REDIS_HOST`. A bare `host:port` gets the
/// `redis://` scheme prepended.
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = env_first(&["REDIS_URL", "REDIS_HOST"])
            .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))?;

        let url = if raw.contains("://") {
            raw
        } else {
            format!("redis://{raw}")
        };

        Ok(Self { url })
    }
}

#[cfg(all(test, feature = "config"))]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_prefers_redis_url() {
        temp_env::with_vars(
            [
                ("REDIS_URL", Some("redis://cache:6379/2")),
                ("REDIS_HOST", Some("ignored:6379")),
            ],
            || {
                assert_eq!(RedisConfig::from_env().unwrap().url, "redis://cache:6379/2");
            },
        );
    }

    #[test]
    fn test_from_env_adds_scheme_to_host() {
        temp_env::with_vars(
            [("REDIS_URL", None), ("REDIS_HOST", Some("cache:6379"))],
            || {
                assert_eq!(RedisConfig::from_env().unwrap().url(), "redis://cache:6379");
            },
        );
    }

    #[test]
    fn test_from_env_missing() {
        temp_env::with_vars_unset(["REDIS_URL", "REDIS_HOST"], || {
            let err = RedisConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("REDIS_URL"));
        });
    }
}
