//! Per-channel resource tracking
//!
//! Every channel carries a bag of auxiliary resources that must be released
//! when it is destroyed. Each entry says explicitly how it is held: open
//! subscriptions are weak (the listener owns them), file attachments are
//! strong (the tracker is the only record of which files a channel owns).

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::SubscriptionHandle;

/// Weak entries are pruned on insert once the bag grows past this size.
const PRUNE_THRESHOLD: usize = 64;

/// Proof that an attachment belongs to a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileAttachmentRecord {
    pub channel_name: String,
    pub attachment_id: String,
}

impl FileAttachmentRecord {
    pub fn new(channel_name: impl Into<String>, attachment_id: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            attachment_id: attachment_id.into(),
        }
    }

    /// Lookup key, `{channel}:{id}`
    pub fn record_key(&self) -> String {
        format!("{}:{}", self.channel_name, self.attachment_id)
    }
}

/// A tracked entry as stored in the bag
#[derive(Debug, Clone)]
pub enum ChannelResource {
    /// Weakly held; the listener that opened the subscription owns it
    Subscription(Weak<SubscriptionHandle>),
    /// Strongly held; authoritative ownership of an attachment
    Attachment(FileAttachmentRecord),
}

impl ChannelResource {
    pub fn subscription(handle: &Arc<SubscriptionHandle>) -> Self {
        Self::Subscription(Arc::downgrade(handle))
    }

    /// Whether this entry still refers to something that needs releasing
    pub fn is_live(&self) -> bool {
        match self {
            Self::Subscription(weak) => weak
                .upgrade()
                .is_some_and(|handle| !handle.is_closed()),
            Self::Attachment(_) => true,
        }
    }

    /// Resolve weak references, `None` if the target is gone
    pub fn resolve(&self) -> Option<LiveResource> {
        match self {
            Self::Subscription(weak) => weak
                .upgrade()
                .filter(|handle| !handle.is_closed())
                .map(LiveResource::Subscription),
            Self::Attachment(record) => Some(LiveResource::Attachment(record.clone())),
        }
    }
}

/// A tracked entry with weak references resolved
#[derive(Debug, Clone)]
pub enum LiveResource {
    Subscription(Arc<SubscriptionHandle>),
    Attachment(FileAttachmentRecord),
}

/// Concurrent bag of channel-owned resources
#[derive(Debug, Default)]
pub struct ResourceTracker {
    entries: Mutex<Vec<ChannelResource>>,
}

impl ResourceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a resource
    pub fn track(&self, resource: ChannelResource) {
        let mut entries = self.entries.lock();
        if entries.len() >= PRUNE_THRESHOLD {
            entries.retain(ChannelResource::is_live);
        }
        entries.push(resource);
    }

    /// Track an open subscription without owning it
    pub fn track_subscription(&self, handle: &Arc<SubscriptionHandle>) {
        self.track(ChannelResource::subscription(handle));
    }

    /// Track an attachment record
    pub fn track_attachment(&self, record: FileAttachmentRecord) {
        self.track(ChannelResource::Attachment(record));
    }

    /// Snapshot of live entries, skipping anything already reclaimed
    pub fn live(&self) -> Vec<LiveResource> {
        self.entries
            .lock()
            .iter()
            .filter_map(ChannelResource::resolve)
            .collect()
    }

    /// Attachment records owned by the channel
    pub fn attachments(&self) -> Vec<FileAttachmentRecord> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| match entry {
                ChannelResource::Attachment(record) => Some(record.clone()),
                ChannelResource::Subscription(_) => None,
            })
            .collect()
    }

    /// Open subscription handles
    pub fn subscriptions(&self) -> Vec<Arc<SubscriptionHandle>> {
        self.live()
            .into_iter()
            .filter_map(|resource| match resource {
                LiveResource::Subscription(handle) => Some(handle),
                LiveResource::Attachment(_) => None,
            })
            .collect()
    }

    /// Whether an attachment id belongs to the channel
    pub fn has_attachment(&self, attachment_id: &str) -> bool {
        self.entries.lock().iter().any(|entry| {
            matches!(entry, ChannelResource::Attachment(record) if record.attachment_id == attachment_id)
        })
    }

    /// Stop tracking an attachment (used when a send is rolled back)
    pub fn forget_attachment(&self, attachment_id: &str) {
        self.entries.lock().retain(|entry| {
            !matches!(entry, ChannelResource::Attachment(record) if record.attachment_id == attachment_id)
        });
    }

    /// Number of entries, including ones not yet pruned
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every entry, returning what was live
    pub fn drain(&self) -> Vec<LiveResource> {
        let entries = std::mem::take(&mut *self.entries.lock());
        entries.iter().filter_map(ChannelResource::resolve).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key() {
        let record = FileAttachmentRecord::new("lobby", "0123456789abcdef");
        assert_eq!(record.record_key(), "lobby:0123456789abcdef");
    }

    #[test]
    fn test_dropped_subscription_is_skipped() {
        let tracker = ResourceTracker::new();
        let kept = SubscriptionHandle::new("lobby");
        let dropped = SubscriptionHandle::new("lobby");

        tracker.track_subscription(&kept);
        tracker.track_subscription(&dropped);
        tracker.track_attachment(FileAttachmentRecord::new("lobby", "aa"));
        drop(dropped);

        let live = tracker.live();
        assert_eq!(live.len(), 2);
        assert_eq!(tracker.subscriptions().len(), 1);
        assert_eq!(tracker.attachments().len(), 1);
    }

    #[test]
    fn test_closed_subscription_is_not_live() {
        let handle = SubscriptionHandle::new("lobby");
        let resource = ChannelResource::subscription(&handle);
        assert!(resource.is_live());

        handle.close();
        assert!(!resource.is_live());
        assert!(resource.resolve().is_none());
    }

    #[test]
    fn test_attachment_is_strong() {
        let tracker = ResourceTracker::new();
        tracker.track_attachment(FileAttachmentRecord::new("lobby", "aa"));

        assert!(tracker.has_attachment("aa"));
        assert!(!tracker.has_attachment("bb"));

        tracker.forget_attachment("aa");
        assert!(!tracker.has_attachment("aa"));
    }

    #[test]
    fn test_prunes_dead_weak_entries() {
        let tracker = ResourceTracker::new();
        for _ in 0..PRUNE_THRESHOLD {
            let handle = SubscriptionHandle::new("lobby");
            tracker.track_subscription(&handle);
        }
        tracker.track_attachment(FileAttachmentRecord::new("lobby", "aa"));

        assert_eq!(tracker.len(), 1);
        assert!(tracker.has_attachment("aa"));
    }

    #[test]
    fn test_drain_empties_tracker() {
        let tracker = ResourceTracker::new();
        let handle = SubscriptionHandle::new("lobby");
        tracker.track_subscription(&handle);
        tracker.track_attachment(FileAttachmentRecord::new("lobby", "aa"));

        let drained = tracker.drain();
        assert_eq!(drained.len(), 2);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_concurrent_track() {
        let tracker = Arc::new(ResourceTracker::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        tracker.track_attachment(FileAttachmentRecord::new("lobby", format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(tracker.attachments().len(), 80);
    }
}
