//! # ephemera-cache
//!
//! Redis backend for multi-node deployments.
//!
//! - **Connection Pool**: managed Redis connections with deadpool
//! - **Pub/Sub**: message fan-out across nodes ([`RedisFanout`])
//! - **History**: bounded per-channel lists ([`RedisHistory`])
//! - **Attachments**: password-gated file ownership records ([`RedisAttachmentIndex`])

mod fanout;
pub mod pool;
pub mod pubsub;
pub mod store;

pub use fanout::RedisFanout;

pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

pub use pubsub::{
    Publisher, ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult, CHANNEL_PREFIX,
};

pub use store::{
    purge_stale_state, RedisAttachmentIndex, RedisHistory, ATTACHMENT_PREFIX, HISTORY_PREFIX,
};
