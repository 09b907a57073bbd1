use core_config::{ConfigError, FromEnv, env_first, env_parse};

pub const DEFAULT_EXCHANGE: &str = "products";
pub const DEFAULT_QUEUE: &str = "product";
pub const DEFAULT_BINDING_KEY: &str = "product.*";

/// AMQP connection and topology settings.
///
/// Publishers only need `url` and `exchange`; the queue fields describe the
/// durable queue a subscriber declares and binds.
#[derive(Clone, Debug)]
pub struct AmqpConfig {
    pub url: String,
    pub exchange: String,
    pub queue: String,
    pub binding_key: String,
    /// Unacknowledged deliveries in flight per consumer.
    pub prefetch: u16,
    pub consumer_tag: String,
}

impl AmqpConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            binding_key: DEFAULT_BINDING_KEY.to_string(),
            prefetch: 1,
            consumer_tag: "catalog-consumer".to_string(),
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>, binding_key: impl Into<String>) -> Self {
        self.queue = queue.into();
        self.binding_key = binding_key.into();
        self
    }

    pub fn with_consumer_tag(mut self, tag: impl Into<String>) -> Self {
        self.consumer_tag = tag.into();
        self
    }
}

impl FromEnv for AmqpConfig {
    /// - `AMQP_URL` (or `RABBITMQ_URL` / `MESSAGE_BROKER_URL`), required
    /// - `AMQP_EXCHANGE` (or `MESSAGE_BROKER_EXCHANGE`), default `products`
    /// - `AMQP_QUEUE` default `product`, `AMQP_BINDING_KEY` default `product.*`
    /// - `AMQP_PREFETCH` default 1
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_first(&["AMQP_URL", "RABBITMQ_URL", "MESSAGE_BROKER_URL"])
            .ok_or_else(|| ConfigError::MissingEnvVar("AMQP_URL or RABBITMQ_URL".to_string()))?;

        let exchange = env_first(&["AMQP_EXCHANGE", "MESSAGE_BROKER_EXCHANGE"])
            .unwrap_or_else(|| DEFAULT_EXCHANGE.to_string());
        let queue = env_first(&["AMQP_QUEUE"]).unwrap_or_else(|| DEFAULT_QUEUE.to_string());
        let binding_key =
            env_first(&["AMQP_BINDING_KEY"]).unwrap_or_else(|| DEFAULT_BINDING_KEY.to_string());

        let prefetch = env_parse("AMQP_PREFETCH", 1u16)?;
        if prefetch == 0 {
            return Err(ConfigError::ParseError {
                key: "AMQP_PREFETCH".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            prefetch,
            ..AmqpConfig::new(url)
                .with_exchange(exchange)
                .with_queue(queue, binding_key)
        })
    }
}
