//! In-process fan-out over `tokio::sync::broadcast`.

use async_trait::async_trait;
use dashmap::DashMap;
use ephemera_core::{DomainResult, FanoutBus, Message, Subscription, SubscriptionHandle};
use futures::stream;
use tokio::sync::broadcast::{self, error::RecvError};

/// One broadcast channel per channel name
///
/// Each subscriber buffers up to `buffer` messages; a subscriber that falls
/// further behind loses the oldest ones and keeps going.
#[derive(Debug)]
pub struct LocalFanout {
    topics: DashMap<String, broadcast::Sender<Message>>,
    buffer: usize,
}

impl LocalFanout {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Open subscriptions on a channel
    pub fn receiver_count(&self, channel: &str) -> usize {
        self.topics
            .get(channel)
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for LocalFanout {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl FanoutBus for LocalFanout {
    async fn publish(&self, channel: &str, message: &Message) -> DomainResult<usize> {
        let Some(tx) = self.topics.get(channel) else {
            return Ok(0);
        };
        // Err only means nobody is listening
        let receivers = tx.send(message.clone()).unwrap_or(0);
        tracing::debug!(channel = %channel, receivers, "Published message");
        Ok(receivers)
    }

    async fn subscribe(&self, channel: &str) -> DomainResult<Subscription> {
        let receiver = self
            .topics
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe();

        let name = channel.to_string();
        let messages = stream::unfold(receiver, move |mut rx| {
            let name = name.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(message) => return Some((message, rx)),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(channel = %name, skipped, "Subscriber lagging, messages dropped");
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(Subscription::new(SubscriptionHandle::new(channel), messages))
    }

    async fn close_all(&self, channel: &str) -> DomainResult<()> {
        // Dropping the sender ends every receiver's stream
        if self.topics.remove(channel).is_some() {
            tracing::debug!(channel = %channel, "Closed local subscriptions");
        }
        Ok(())
    }
}
