//! Event Bus
//!
//! Publishes domain events to a topic exchange and hands them to consumers
//! with at-least-once semantics.
//!
//! ## Features
//!
//! - **Typed routing keys**: `"<entity>.<verb>"` with a closed [`Verb`] set
//! - **Explicit settlement**: consumers ack, nack-requeue or reject each delivery
//! - **AMQP transport**: [`AmqpEventBus`] over lapin, durable topology, no confirms
//! - **In-memory broker**: [`InMemoryBroker`] with the same topic and redelivery rules
//!
//! ## Example
//!
//! ```rust,ignore
//! use event_bus::{AmqpConfig, AmqpEventBus, EventBusExt, Subscription, Disposition};
//!
//! let config = AmqpConfig::from_env()?;
//! let bus = AmqpEventBus::connect(&config).await?;
//! bus.publish_json(&config.exchange, "product.deleted", &json!({"id": 7})).await?;
//!
//! let mut subscription = bus.subscribe(&config).await?;
//! while let Some(delivery) = subscription.next_delivery().await {
//!     let delivery = delivery?;
//!     subscription.settle(&delivery, Disposition::Ack).await?;
//! }
//! ```

mod amqp;
mod bus;
mod config;
mod error;
mod memory;
mod routing;

pub use amqp::{AmqpEventBus, AmqpSubscription};
pub use bus::{Delivery, Disposition, EventBus, EventBusExt, Subscription};
pub use config::{AmqpConfig, DEFAULT_BINDING_KEY, DEFAULT_EXCHANGE, DEFAULT_QUEUE};
pub use error::{BusError, ErrorCategory};
pub use memory::{InMemoryBroker, InMemorySubscription, PublishedMessage, topic_matches};
pub use routing::{RoutingKey, Verb};
