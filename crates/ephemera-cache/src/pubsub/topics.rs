//! Pub/Sub topic naming.

/// Prefix of every channel topic
pub const CHANNEL_PREFIX: &str = "channel:";

/// Topic a channel's messages are published on
#[must_use]
pub fn topic(channel: &str) -> String {
    format!("{CHANNEL_PREFIX}{channel}")
}

/// Channel name carried by a topic, `None` for foreign topics
#[must_use]
pub fn channel_name(topic: &str) -> Option<&str> {
    topic.strip_prefix(CHANNEL_PREFIX)
}
