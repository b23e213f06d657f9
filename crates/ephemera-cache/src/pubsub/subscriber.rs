//! Redis Pub/Sub subscriber.
//!
//! Holds one dedicated pub/sub connection per node and re-broadcasts every
//! received payload in-process. Subscribe and unsubscribe requests are
//! acknowledged once Redis has confirmed them, so a caller that awaited
//! [`Subscriber::subscribe`] is guaranteed to see every later publish.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ephemera_core::Message;
use futures_util::StreamExt;
use redis::Client;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};

use crate::pool::redact_url;
use crate::pubsub::channel_name;

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to parse message: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Subscriber closed")]
    ChannelClosed,

    #[error("Timed out waiting for Redis to confirm {0}")]
    Timeout(&'static str),
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

impl From<SubscriberError> for ephemera_core::DomainError {
    fn from(err: SubscriberError) -> Self {
        Self::backend(err)
    }
}

/// Raw message received from Pub/Sub
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub topic: String,
    pub payload: String,
}

impl ReceivedMessage {
    fn from_redis(topic: String, payload: String) -> Self {
        Self { topic, payload }
    }

    /// Channel this message was published to, if it is a channel topic
    pub fn channel(&self) -> Option<&str> {
        channel_name(&self.topic)
    }

    /// Decode the payload into a channel message
    pub fn decode(&self) -> SubscriberResult<Message> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub redis_url: String,
    /// In-process broadcast buffer shared by every local listener
    pub broadcast_buffer: usize,
    pub reconnect_delay_ms: u64,
    /// How long subscribe/unsubscribe wait for Redis to confirm
    pub ack_timeout_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
            ack_timeout_ms: 5000,
        }
    }
}

type Ack = oneshot::Sender<SubscriberResult<()>>;

#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(Vec<String>, Ack),
    Unsubscribe(Vec<String>, Ack),
}

/// Redis Pub/Sub subscriber
pub struct Subscriber {
    config: SubscriberConfig,
    subscribed: Arc<RwLock<HashSet<String>>>,
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    control_tx: mpsc::Sender<SubscriberCommand>,
    shutdown_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("redis_url", &redact_url(&self.config.redis_url))
            .field("receivers", &self.broadcast_tx.receiver_count())
            .field("topics", &self.subscribed.try_read().map(|t| t.len()).ok())
            .finish()
    }
}

impl Subscriber {
    /// Create a new subscriber and start the background listener
    pub async fn new(config: SubscriberConfig) -> SubscriberResult<Self> {
        // Validate the URL up front; connecting happens in the listener.
        Client::open(config.redis_url.as_str())?;

        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let subscribed = Arc::new(RwLock::new(HashSet::new()));

        tokio::spawn(Self::listener_loop(
            config.clone(),
            subscribed.clone(),
            broadcast_tx.clone(),
            control_rx,
            shutdown_rx,
        ));

        Ok(Self {
            config,
            subscribed,
            broadcast_tx,
            control_tx,
            shutdown_tx,
        })
    }

    async fn listener_loop(
        config: SubscriberConfig,
        subscribed: Arc<RwLock<HashSet<String>>>,
        broadcast_tx: broadcast::Sender<ReceivedMessage>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            match Self::run_listener(
                &config,
                &subscribed,
                &broadcast_tx,
                &mut control_rx,
                &mut shutdown_rx,
            )
            .await
            {
                Ok(true) => {
                    tracing::info!("Subscriber shutting down");
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber error, reconnecting...");
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_millis(config.reconnect_delay_ms)) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }
        }
    }

    /// Run the listener until error or shutdown; `Ok(true)` means stop
    async fn run_listener(
        config: &SubscriberConfig,
        subscribed: &Arc<RwLock<HashSet<String>>>,
        broadcast_tx: &broadcast::Sender<ReceivedMessage>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SubscriberResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        // Restore the topic set after a reconnect
        {
            let topics = subscribed.read().await;
            for topic in topics.iter() {
                pubsub.subscribe(topic).await?;
            }
        }

        tracing::info!(url = %redact_url(&config.redis_url), "Subscriber connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(msg) => {
                            let topic = msg.get_channel_name().to_string();
                            let payload: String = msg.get_payload().unwrap_or_default();

                            tracing::trace!(topic = %topic, "Received Pub/Sub message");

                            // No local listeners is not an error
                            let _ = broadcast_tx.send(ReceivedMessage::from_redis(topic, payload));
                        }
                        None => {
                            tracing::warn!("Pub/Sub stream ended");
                            return Ok(false);
                        }
                    }
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(SubscriberCommand::Subscribe(topics, ack)) => {
                            drop(stream);
                            let mut result = Ok(());
                            for topic in &topics {
                                subscribed.write().await.insert(topic.clone());
                                if let Err(e) = pubsub.subscribe(topic).await {
                                    tracing::error!(topic = %topic, error = %e, "Failed to subscribe");
                                    subscribed.write().await.remove(topic);
                                    result = Err(e);
                                    break;
                                }
                                tracing::debug!(topic = %topic, "Subscribed to topic");
                            }
                            match result {
                                Ok(()) => {
                                    let _ = ack.send(Ok(()));
                                }
                                Err(e) => {
                                    let _ = ack.send(Err(SubscriberError::ChannelClosed));
                                    return Err(e.into());
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Unsubscribe(topics, ack)) => {
                            drop(stream);
                            for topic in &topics {
                                subscribed.write().await.remove(topic);
                                if let Err(e) = pubsub.unsubscribe(topic).await {
                                    // Already out of the set; the reconnect drops it.
                                    tracing::error!(topic = %topic, error = %e, "Failed to unsubscribe");
                                    let _ = ack.send(Err(SubscriberError::ChannelClosed));
                                    return Err(e.into());
                                }
                                tracing::debug!(topic = %topic, "Unsubscribed from topic");
                            }
                            let _ = ack.send(Ok(()));
                            stream = pubsub.on_message();
                        }
                        None => {
                            tracing::warn!("Control channel closed");
                            return Ok(true);
                        }
                    }
                }

                _ = shutdown_rx.changed() => {
                    return Ok(true);
                }
            }
        }
    }

    async fn request(
        &self,
        what: &'static str,
        build: impl FnOnce(Ack) -> SubscriberCommand,
    ) -> SubscriberResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.control_tx
            .send(build(ack_tx))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)?;

        match tokio::time::timeout(Duration::from_millis(self.config.ack_timeout_ms), ack_rx).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SubscriberError::ChannelClosed),
            Err(_) => Err(SubscriberError::Timeout(what)),
        }
    }

    /// Subscribe to topics, returning once Redis has confirmed
    pub async fn subscribe(&self, topics: &[String]) -> SubscriberResult<()> {
        let topics = topics.to_vec();
        self.request("subscribe", |ack| SubscriberCommand::Subscribe(topics, ack))
            .await
    }

    /// Unsubscribe from topics, returning once Redis has confirmed
    pub async fn unsubscribe(&self, topics: &[String]) -> SubscriberResult<()> {
        let topics = topics.to_vec();
        self.request("unsubscribe", |ack| SubscriberCommand::Unsubscribe(topics, ack))
            .await
    }

    /// Get a receiver for every message this node receives
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Stop the background listener
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for subscriber
#[derive(Debug)]
pub struct SubscriberBuilder {
    config: SubscriberConfig,
}

impl SubscriberBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SubscriberConfig::default(),
        }
    }

    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    #[must_use]
    pub fn broadcast_buffer(mut self, size: usize) -> Self {
        self.config.broadcast_buffer = size;
        self
    }

    #[must_use]
    pub fn reconnect_delay_ms(mut self, delay: u64) -> Self {
        self.config.reconnect_delay_ms = delay;
        self
    }

    #[must_use]
    pub fn ack_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.ack_timeout_ms = timeout;
        self
    }

    /// Build and start the subscriber
    pub async fn build(self) -> SubscriberResult<Subscriber> {
        Subscriber::new(self.config).await
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_message_decoding() {
        let payload = serde_json::to_string(&Message::text("hi")).unwrap();
        let msg = ReceivedMessage::from_redis("channel:lobby".to_string(), payload);

        assert_eq!(msg.channel(), Some("lobby"));
        assert_eq!(msg.decode().unwrap(), Message::text("hi"));
    }

    #[test]
    fn test_received_message_invalid_json() {
        let msg = ReceivedMessage::from_redis("channel:lobby".to_string(), "invalid".to_string());
        assert!(matches!(msg.decode(), Err(SubscriberError::ParseError(_))));
    }

    #[test]
    fn test_subscriber_builder() {
        let builder = SubscriberBuilder::new()
            .redis_url("redis://localhost:6380")
            .broadcast_buffer(2048)
            .reconnect_delay_ms(500)
            .ack_timeout_ms(100);

        assert_eq!(builder.config.redis_url, "redis://localhost:6380");
        assert_eq!(builder.config.broadcast_buffer, 2048);
        assert_eq!(builder.config.reconnect_delay_ms, 500);
        assert_eq!(builder.config.ack_timeout_ms, 100);
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let result = SubscriberBuilder::new().redis_url("not a url").build().await;
        assert!(matches!(result, Err(SubscriberError::Redis(_))));
    }

    #[tokio::test]
    async fn test_subscribe_times_out_without_redis() {
        let subscriber = SubscriberBuilder::new()
            .redis_url("redis://127.0.0.1:1")
            .reconnect_delay_ms(50)
            .ack_timeout_ms(200)
            .build()
            .await
            .unwrap();

        let result = subscriber.subscribe(&["channel:lobby".to_string()]).await;
        assert!(result.is_err());
    }
}
