//! Attachment lookups answered from the registry's resource trackers.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use ephemera_core::{AttachmentIndex, DomainResult, FileAttachmentRecord};

use crate::registry::ChannelRegistry;

/// In a single process the channel's own tracker already records which
/// attachments it owns, so registering is a no-op and lookups read through.
#[derive(Debug, Clone)]
pub struct LocalAttachmentIndex {
    registry: Weak<ChannelRegistry>,
}

impl LocalAttachmentIndex {
    pub fn new(registry: &Arc<ChannelRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
        }
    }
}

#[async_trait]
impl AttachmentIndex for LocalAttachmentIndex {
    async fn register(
        &self,
        _record: &FileAttachmentRecord,
        _password_hash: &str,
    ) -> DomainResult<()> {
        Ok(())
    }

    async fn password_hash(&self, record: &FileAttachmentRecord) -> DomainResult<Option<String>> {
        Ok(self
            .registry
            .upgrade()
            .and_then(|registry| registry.lookup(&record.channel_name))
            .filter(|channel| channel.resources().has_attachment(&record.attachment_id))
            .map(|channel| channel.password_hash().to_string()))
    }

    async fn remove(&self, record: &FileAttachmentRecord) -> DomainResult<()> {
        if let Some(channel) = self
            .registry
            .upgrade()
            .and_then(|registry| registry.lookup(&record.channel_name))
        {
            channel.resources().forget_attachment(&record.attachment_id);
        }
        Ok(())
    }
}
