//! Redis Pub/Sub publisher.

use ephemera_core::Message;
use redis::AsyncCommands;

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::topic;

/// Publishes channel messages as JSON
#[derive(Debug, Clone)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish a message on a channel's topic
    ///
    /// Returns the number of Redis connections that received it, which is one
    /// per subscribed node rather than one per listener.
    pub async fn publish(&self, channel: &str, message: &Message) -> RedisResult<u32> {
        let payload = serde_json::to_string(message)?;
        self.publish_raw(&topic(channel), &payload).await
    }

    /// Publish a pre-encoded payload on an arbitrary topic
    pub async fn publish_raw(&self, topic: &str, payload: &str) -> RedisResult<u32> {
        let mut conn = self.pool.get().await?;
        let receivers: u32 = conn.publish(topic, payload).await?;

        tracing::debug!(topic = %topic, receivers, "Published message");

        Ok(receivers)
    }
}
