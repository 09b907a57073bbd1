use async_trait::async_trait;
use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::error::BusError;
use crate::routing::RoutingKey;

/// Fire-and-forget publisher onto a topic exchange.
///
/// No confirms, no outbox: a failed publish is reported once and the
/// message is gone.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), BusError>;
}

/// JSON convenience over [`EventBus::publish`].
#[async_trait]
pub trait EventBusExt: EventBus {
    async fn publish_json<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &T,
    ) -> Result<(), BusError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let payload = serde_json::to_vec(message)?;
        self.publish(exchange, routing_key, payload).await
    }
}

impl<B: EventBus + ?Sized> EventBusExt for B {}

/// A message handed to a consumer, unsettled until [`Subscription::settle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub routing_key: String,
    pub payload: Vec<u8>,
    /// Set by the broker when this message was handed out before.
    pub redelivered: bool,
}

impl Delivery {
    pub fn routing(&self) -> Result<RoutingKey, BusError> {
        RoutingKey::parse(&self.routing_key)
    }
}

/// How a consumer settles a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Disposition {
    Ack,
    /// Negative acknowledgement, returned to the queue.
    NackRequeue,
    /// Dropped (or dead-lettered by broker policy), never redelivered.
    Reject,
}

/// At-least-once stream of deliveries from one queue.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next delivery. `None` once the stream has ended.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BusError>>;

    async fn settle(&self, delivery: &Delivery, disposition: Disposition) -> Result<(), BusError>;
}
