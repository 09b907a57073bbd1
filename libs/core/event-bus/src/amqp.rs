//! RabbitMQ transport over lapin.
//!
//! Topology: one durable topic exchange; subscribers declare a durable queue,
//! bind it with a pattern such as `product.*` and consume with manual acks.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{debug, info, instrument};

use crate::bus::{Delivery, Disposition, EventBus, Subscription};
use crate::config::AmqpConfig;
use crate::error::BusError;

const PERSISTENT: u8 = 2;

pub struct AmqpEventBus {
    connection: Connection,
    channel: Channel,
}

impl AmqpEventBus {
    /// Connects and declares the configured exchange.
    pub async fn connect(config: &AmqpConfig) -> Result<Self, BusError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Connection(format!("Failed to connect: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create channel: {e}")))?;

        declare_exchange(&channel, &config.exchange).await?;

        info!(exchange = %config.exchange, "Connected to AMQP");
        Ok(Self {
            connection,
            channel,
        })
    }

    /// Declares and binds the configured queue, then starts consuming on a
    /// dedicated channel limited to `config.prefetch` unacked deliveries.
    pub async fn subscribe(&self, config: &AmqpConfig) -> Result<AmqpSubscription, BusError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to create channel: {e}")))?;

        declare_exchange(&channel, &config.exchange).await?;

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {e}")))?;

        channel
            .queue_bind(
                &config.queue,
                &config.exchange,
                &config.binding_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to bind queue: {e}")))?;

        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to set prefetch: {e}")))?;

        let consumer = channel
            .basic_consume(
                &config.queue,
                &config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {e}")))?;

        info!(
            queue = %config.queue,
            binding_key = %config.binding_key,
            prefetch = config.prefetch,
            "Bound queue to exchange"
        );

        Ok(AmqpSubscription { channel, consumer })
    }

    pub async fn close(&self) {
        if let Err(e) = self.connection.close(200, "shutdown").await {
            debug!(error = %e, "AMQP connection already closed");
        }
    }
}

async fn declare_exchange(channel: &Channel, exchange: &str) -> Result<(), BusError> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Connection(format!("Failed to declare exchange: {e}")))
}

#[async_trait]
impl EventBus for AmqpEventBus {
    #[instrument(name = "bus.publish", skip(self, payload), fields(bytes = payload.len()))]
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), BusError> {
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT);

        // The returned confirm is dropped: confirms are not enabled on this channel.
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        debug!("Published event");
        Ok(())
    }
}

pub struct AmqpSubscription {
    channel: Channel,
    consumer: Consumer,
}

#[async_trait]
impl Subscription for AmqpSubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BusError>> {
        let next = self.consumer.next().await?;
        Some(
            next.map(|delivery| Delivery {
                delivery_tag: delivery.delivery_tag,
                routing_key: delivery.routing_key.as_str().to_string(),
                payload: delivery.data,
                redelivered: delivery.redelivered,
            })
            .map_err(|e| BusError::Subscribe(format!("Consumer delivery error: {e}"))),
        )
    }

    async fn settle(&self, delivery: &Delivery, disposition: Disposition) -> Result<(), BusError> {
        let tag = delivery.delivery_tag;
        let result = match disposition {
            Disposition::Ack => self.channel.basic_ack(tag, BasicAckOptions::default()).await,
            Disposition::NackRequeue => {
                self.channel
                    .basic_nack(
                        tag,
                        BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        },
                    )
                    .await
            }
            Disposition::Reject => {
                self.channel
                    .basic_reject(tag, BasicRejectOptions { requeue: false })
                    .await
            }
        };

        result.map_err(|e| BusError::Settle(format!("{disposition} of tag {tag}: {e}")))
    }
}
