//! Networked fan-out over Redis Pub/Sub.
//!
//! Every node keeps one pub/sub connection. A topic is subscribed while at
//! least one local listener holds a lease on it; the last lease to go away
//! unsubscribes. Leases carry the generation of the topic entry they were
//! taken on, so a lease outliving `close_all` never touches a newer entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use ephemera_core::{DomainResult, FanoutBus, Message, Subscription, SubscriptionHandle};
use futures_util::stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;

use crate::pool::RedisPool;
use crate::pubsub::{topic, Publisher, Subscriber, SubscriberBuilder};

#[derive(Debug)]
struct TopicLease {
    generation: u64,
    holders: usize,
    handles: Vec<Weak<SubscriptionHandle>>,
}

type Leases = Arc<Mutex<HashMap<String, TopicLease>>>;

/// Released when a subscription stream is dropped
struct LeaseGuard {
    topic: String,
    generation: u64,
    leases: Leases,
    subscriber: Arc<Subscriber>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let topic = std::mem::take(&mut self.topic);
        let generation = self.generation;
        let leases = self.leases.clone();
        let subscriber = self.subscriber.clone();

        runtime.spawn(async move {
            let mut leases = leases.lock().await;
            let Some(lease) = leases.get_mut(&topic) else {
                return;
            };
            if lease.generation != generation {
                return;
            }
            lease.holders = lease.holders.saturating_sub(1);
            lease.handles.retain(|weak| weak.strong_count() > 0);
            if lease.holders > 0 {
                return;
            }
            leases.remove(&topic);
            if let Err(e) = subscriber.unsubscribe(std::slice::from_ref(&topic)).await {
                tracing::warn!(topic = %topic, error = %e, "Failed to release topic");
            }
        });
    }
}

/// Fan-out bus shared by every node connected to the same Redis
pub struct RedisFanout {
    publisher: Publisher,
    subscriber: Arc<Subscriber>,
    leases: Leases,
    next_generation: AtomicU64,
}

impl std::fmt::Debug for RedisFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisFanout")
            .field("subscriber", &self.subscriber)
            .finish_non_exhaustive()
    }
}

impl RedisFanout {
    /// Start the node's pub/sub connection
    ///
    /// `buffer` bounds the in-process backlog shared by all local listeners.
    pub async fn new(pool: RedisPool, buffer: usize) -> DomainResult<Self> {
        let subscriber = SubscriberBuilder::new()
            .redis_url(pool.url())
            .broadcast_buffer(buffer)
            .build()
            .await?;

        Ok(Self {
            publisher: Publisher::new(pool),
            subscriber: Arc::new(subscriber),
            leases: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        })
    }

    async fn acquire(&self, topic: &str, handle: &Arc<SubscriptionHandle>) -> DomainResult<u64> {
        let mut leases = self.leases.lock().await;

        if let Some(lease) = leases.get_mut(topic) {
            lease.holders += 1;
            lease.handles.push(Arc::downgrade(handle));
            return Ok(lease.generation);
        }

        // Held across the acknowledgement so subscribe and unsubscribe
        // requests for one topic reach Redis in order.
        self.subscriber.subscribe(&[topic.to_string()]).await?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        leases.insert(
            topic.to_string(),
            TopicLease {
                generation,
                holders: 1,
                handles: vec![Arc::downgrade(handle)],
            },
        );
        Ok(generation)
    }
}

#[async_trait]
impl FanoutBus for RedisFanout {
    async fn publish(&self, channel: &str, message: &Message) -> DomainResult<usize> {
        let receivers = self.publisher.publish(channel, message).await?;
        Ok(receivers as usize)
    }

    async fn subscribe(&self, channel: &str) -> DomainResult<Subscription> {
        let topic = topic(channel);
        // Taken before the subscribe is confirmed so nothing published after
        // the confirmation can be missed.
        let receiver = self.subscriber.receiver();
        let handle = SubscriptionHandle::new(channel);
        let generation = self.acquire(&topic, &handle).await?;

        let guard = LeaseGuard {
            topic,
            generation,
            leases: self.leases.clone(),
            subscriber: self.subscriber.clone(),
        };

        let messages = stream::unfold((receiver, guard), |(mut rx, guard)| async move {
            loop {
                match rx.recv().await {
                    Ok(received) if received.topic == guard.topic => match received.decode() {
                        Ok(message) => return Some((message, (rx, guard))),
                        Err(e) => {
                            tracing::warn!(topic = %guard.topic, error = %e, "Skipping undecodable payload");
                        }
                    },
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %guard.topic, skipped, "Subscriber lagging, messages dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(Subscription::new(handle, messages))
    }

    async fn close_all(&self, channel: &str) -> DomainResult<()> {
        let topic = topic(channel);
        let mut leases = self.leases.lock().await;

        let Some(lease) = leases.remove(&topic) else {
            return Ok(());
        };

        let closed = lease
            .handles
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|handle| handle.close())
            .count();

        tracing::debug!(channel = %channel, closed, "Closed Redis subscriptions");

        self.subscriber.unsubscribe(&[topic]).await?;
        Ok(())
    }
}
