//! Releases a channel's backend state when it expires.

use std::sync::Arc;

use async_trait::async_trait;
use ephemera_core::{
    AttachmentIndex, Channel, DestructionHandler, DomainResult, FanoutBus, FileStore, HistoryStore,
};
use tracing::{debug, warn};

/// Destruction handler closing subscriptions, deleting files and history
///
/// Every step is attempted even if an earlier one fails; failures are logged
/// and never retried.
#[derive(Clone)]
pub struct ChannelTeardown {
    fanout: Arc<dyn FanoutBus>,
    history: Arc<dyn HistoryStore>,
    files: Arc<dyn FileStore>,
    attachments: Arc<dyn AttachmentIndex>,
}

impl ChannelTeardown {
    pub fn new(
        fanout: Arc<dyn FanoutBus>,
        history: Arc<dyn HistoryStore>,
        files: Arc<dyn FileStore>,
        attachments: Arc<dyn AttachmentIndex>,
    ) -> Self {
        Self {
            fanout,
            history,
            files,
            attachments,
        }
    }
}

#[async_trait]
impl DestructionHandler for ChannelTeardown {
    async fn on_destroy(&self, channel: &Arc<Channel>) -> DomainResult<()> {
        let name = channel.name();

        if let Err(e) = self.fanout.close_all(name).await {
            warn!(channel = %name, error = %e, "Failed to close subscriptions");
        }

        for record in channel.resources().attachments() {
            match self.files.delete(&record.attachment_id).await {
                Ok(()) => debug!(channel = %name, attachment_id = %record.attachment_id, "Attachment deleted"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(channel = %name, attachment_id = %record.attachment_id, error = %e, "Failed to delete attachment");
                }
            }
            if let Err(e) = self.attachments.remove(&record).await {
                warn!(channel = %name, attachment_id = %record.attachment_id, error = %e, "Failed to remove attachment record");
            }
        }

        if let Err(e) = self.history.clear(name).await {
            warn!(channel = %name, error = %e, "Failed to clear history");
        }

        Ok(())
    }
}
