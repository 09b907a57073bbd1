//! Queue consumer that mirrors product events into the [`SearchIndex`].
//!
//! Each delivery ends in exactly one disposition:
//!
//! | outcome                                  | first delivery | redelivered |
//! |------------------------------------------|----------------|-------------|
//! | applied                                  | ack            | ack         |
//! | malformed routing key / unknown verb     | reject         | reject      |
//! | undecodable payload or index failure     | nack, requeue  | reject      |
//!
//! so a message is attempted at most twice.

use event_bus::{Delivery, Disposition, Subscription, Verb};
use metrics::{counter, histogram};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::index::{IndexError, SearchIndex};
use crate::models::{DocumentPatch, SearchDocument};

#[derive(Debug, Error)]
enum ApplyError {
    #[error("Undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Payload of `product.deleted`.
#[derive(Deserialize)]
struct Deleted {
    id: i64,
}

/// Outcome counters, labelled by queue.
#[derive(Clone)]
struct IndexerMetrics {
    queue: String,
}

impl IndexerMetrics {
    fn settled(&self, disposition: Disposition, duration: Duration) {
        counter!(
            "search_indexer_messages_total",
            "queue" => self.queue.clone(),
            "outcome" => disposition.as_ref().to_string()
        )
        .increment(1);

        histogram!(
            "search_indexer_message_duration_seconds",
            "queue" => self.queue.clone()
        )
        .record(duration.as_secs_f64());
    }

    fn settle_failed(&self) {
        counter!(
            "search_indexer_settle_errors_total",
            "queue" => self.queue.clone()
        )
        .increment(1);
    }
}

#[derive(Clone)]
pub struct SearchIndexer {
    index: Arc<dyn SearchIndex>,
    metrics: IndexerMetrics,
}

impl SearchIndexer {
    pub fn new(index: Arc<dyn SearchIndex>, queue: impl Into<String>) -> Self {
        Self {
            index,
            metrics: IndexerMetrics {
                queue: queue.into(),
            },
        }
    }

    /// Applies one delivery to the index and decides how to settle it.
    #[instrument(
        skip(self, delivery),
        fields(
            routing_key = %delivery.routing_key,
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered
        )
    )]
    pub async fn handle(&self, delivery: &Delivery) -> Disposition {
        let routing = match delivery.routing() {
            Ok(routing) => routing,
            Err(e) => {
                warn!(error = %e, "Unroutable message, rejecting");
                return Disposition::Reject;
            }
        };

        match self.apply(routing.verb(), &delivery.payload).await {
            Ok(()) => {
                debug!(verb = %routing.verb(), "Applied to search index");
                Disposition::Ack
            }
            Err(e) if delivery.redelivered => {
                error!(error = %e, "Failed again after redelivery, rejecting");
                Disposition::Reject
            }
            Err(e) => {
                warn!(error = %e, "Failed, requeueing once");
                Disposition::NackRequeue
            }
        }
    }

    async fn apply(&self, verb: Verb, payload: &[u8]) -> Result<(), ApplyError> {
        match verb {
            Verb::Created => {
                let doc: SearchDocument = serde_json::from_slice(payload)?;
                self.index.upsert(&doc).await?;
            }
            Verb::Updated => {
                let patch: DocumentPatch = serde_json::from_slice(payload)?;
                self.index.patch(&patch).await?;
            }
            Verb::Deleted => {
                let Deleted { id } = serde_json::from_slice(payload)?;
                self.index.delete(id).await?;
            }
        }
        Ok(())
    }

    /// Consumes `subscription` one message at a time until the stream ends
    /// or `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run<S: Subscription>(&self, mut subscription: S, mut shutdown: watch::Receiver<bool>) {
        info!(queue = %self.metrics.queue, "Search indexer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping indexer");
                        break;
                    }
                    continue;
                }
                next = subscription.next_delivery() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    error!(error = %e, "Failed to receive delivery");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                None => {
                    info!("Delivery stream ended");
                    break;
                }
            };

            let start = Instant::now();
            let disposition = self.handle(&delivery).await;
            self.metrics.settled(disposition, start.elapsed());

            // An unsettled message is redelivered by the broker later.
            if let Err(e) = subscription.settle(&delivery, disposition).await {
                self.metrics.settle_failed();
                error!(
                    error = %e,
                    delivery_tag = delivery.delivery_tag,
                    %disposition,
                    "Failed to settle delivery"
                );
            }
        }

        info!("Search indexer stopped");
    }
}
