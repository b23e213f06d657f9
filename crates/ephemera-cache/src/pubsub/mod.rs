//! Redis Pub/Sub module.
//!
//! Carries channel messages between nodes sharing one Redis instance.

mod publisher;
mod subscriber;
mod topics;

pub use publisher::Publisher;
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult,
};
pub use topics::{channel_name, topic, CHANNEL_PREFIX};
