//! In-process broker with AMQP topic semantics.
//!
//! Used by tests and local runs. Queues keep ready, unacked and rejected
//! messages separately so at-least-once behaviour can be observed: a
//! requeued or recovered message comes back with `redelivered = true`.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

use crate::bus::{Delivery, Disposition, EventBus, Subscription};
use crate::error::BusError;

/// A message as it was handed to [`EventBus::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Delivery>,
    unacked: HashMap<u64, Delivery>,
    rejected: Vec<Delivery>,
    notify: Arc<Notify>,
    closed: bool,
}

struct Binding {
    exchange: String,
    pattern: String,
    queue: String,
}

#[derive(Default)]
struct BrokerState {
    bindings: Vec<Binding>,
    queues: HashMap<String, QueueState>,
    published: Vec<PublishedMessage>,
    failing: bool,
    next_tag: u64,
}

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        // A poisoned lock only means a test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declares `queue` (if needed) and binds it to `exchange` with a topic pattern.
    pub fn bind(&self, exchange: &str, queue: &str, pattern: &str) {
        let mut state = self.lock();
        state.queues.entry(queue.to_string()).or_default();
        state.bindings.push(Binding {
            exchange: exchange.to_string(),
            pattern: pattern.to_string(),
            queue: queue.to_string(),
        });
    }

    pub fn subscribe(&self, queue: &str) -> InMemorySubscription {
        self.lock().queues.entry(queue.to_string()).or_default();
        InMemorySubscription {
            broker: self.clone(),
            queue: queue.to_string(),
        }
    }

    /// While set, every publish fails with [`BusError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Places a raw message on `queue`, bypassing exchanges and bindings.
    pub fn enqueue(&self, queue: &str, routing_key: &str, payload: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        state.next_tag += 1;
        let delivery = Delivery {
            delivery_tag: state.next_tag,
            routing_key: routing_key.to_string(),
            payload: payload.into(),
            redelivered: false,
        };
        let queue = state.queues.entry(queue.to_string()).or_default();
        queue.ready.push_back(delivery);
        queue.notify.notify_one();
    }

    pub fn ready_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.ready.len())
    }

    pub fn unacked_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    pub fn rejected(&self, queue: &str) -> Vec<Delivery> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.rejected.clone())
            .unwrap_or_default()
    }

    /// Returns every unacked message to the front of its queue, flagged as
    /// redelivered, as a broker does when a consumer's channel drops.
    pub fn recover(&self, queue: &str) {
        let mut state = self.lock();
        if let Some(q) = state.queues.get_mut(queue) {
            let mut pending: Vec<Delivery> = q.unacked.drain().map(|(_, d)| d).collect();
            pending.sort_by_key(|d| std::cmp::Reverse(d.delivery_tag));
            for mut delivery in pending {
                delivery.redelivered = true;
                q.ready.push_front(delivery);
            }
            q.notify.notify_one();
        }
    }

    /// Ends the delivery stream once `queue` has drained.
    pub fn close(&self, queue: &str) {
        let mut state = self.lock();
        if let Some(q) = state.queues.get_mut(queue) {
            q.closed = true;
            q.notify.notify_waiters();
            q.notify.notify_one();
        }
    }
}

#[async_trait]
impl EventBus for InMemoryBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), BusError> {
        let mut state = self.lock();
        if state.failing {
            return Err(BusError::Unavailable(format!(
                "exchange '{exchange}' unreachable"
            )));
        }

        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.clone(),
        });

        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && topic_matches(&b.pattern, routing_key))
            .map(|b| b.queue.clone())
            .collect();

        for queue in targets {
            state.next_tag += 1;
            let delivery = Delivery {
                delivery_tag: state.next_tag,
                routing_key: routing_key.to_string(),
                payload: payload.clone(),
                redelivered: false,
            };
            let q = state.queues.entry(queue).or_default();
            q.ready.push_back(delivery);
            q.notify.notify_one();
        }

        debug!(exchange, routing_key, "Routed in-memory event");
        Ok(())
    }
}

pub struct InMemorySubscription {
    broker: InMemoryBroker,
    queue: String,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BusError>> {
        loop {
            let notify = {
                let mut state = self.broker.lock();
                let q = state.queues.entry(self.queue.clone()).or_default();
                if let Some(delivery) = q.ready.pop_front() {
                    q.unacked.insert(delivery.delivery_tag, delivery.clone());
                    return Some(Ok(delivery));
                }
                if q.closed {
                    return None;
                }
                q.notify.clone()
            };
            notify.notified().await;
        }
    }

    async fn settle(&self, delivery: &Delivery, disposition: Disposition) -> Result<(), BusError> {
        let mut state = self.broker.lock();
        let q = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| BusError::Settle(format!("queue '{}' is gone", self.queue)))?;

        let mut pending = q.unacked.remove(&delivery.delivery_tag).ok_or_else(|| {
            BusError::Settle(format!("unknown delivery tag {}", delivery.delivery_tag))
        })?;

        match disposition {
            Disposition::Ack => {}
            Disposition::NackRequeue => {
                pending.redelivered = true;
                q.ready.push_front(pending);
                q.notify.notify_one();
            }
            Disposition::Reject => q.rejected.push(pending),
        }
        Ok(())
    }
}

/// AMQP topic match: `*` is exactly one word, `#` is zero or more words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&head, tail)) => (word == "*" || word == head) && match_words(rest, tail),
            None => false,
        },
    }
}
