//! Live listener subscriptions
//!
//! A [`Subscription`] is owned by whoever opened it. The channel only keeps a
//! weak reference to its [`SubscriptionHandle`] so it can force-close the
//! stream at expiry without extending its lifetime.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;

use super::Message;

/// Shared close switch for a subscription
#[derive(Debug)]
pub struct SubscriptionHandle {
    channel: String,
    closed: watch::Sender<bool>,
}

impl SubscriptionHandle {
    /// Create a new open handle
    pub fn new(channel: impl Into<String>) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            channel: channel.into(),
            closed,
        })
    }

    /// Name of the channel this subscription listens to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Close the subscription
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the subscription is closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so this can only end by observing `true`.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// A live, push-based stream of messages published to one channel
///
/// The stream completes (yields `None`) when the handle is closed or when the
/// underlying bus shuts the channel down.
pub struct Subscription {
    handle: Arc<SubscriptionHandle>,
    stream: BoxStream<'static, Message>,
}

impl Subscription {
    /// Wrap a backend stream so it ends when `handle` is closed
    pub fn new<S>(handle: Arc<SubscriptionHandle>, stream: S) -> Self
    where
        S: Stream<Item = Message> + Send + 'static,
    {
        let stop = handle.clone();
        let stream = stream
            .take_until(async move { stop.closed().await })
            .boxed();

        Self { handle, stream }
    }

    pub fn handle(&self) -> &Arc<SubscriptionHandle> {
        &self.handle
    }

    pub fn channel(&self) -> &str {
        self.handle.channel()
    }

    /// Close this subscription (idempotent)
    pub fn close(&self) {
        self.handle.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.handle.channel())
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}

impl Stream for Subscription {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}
