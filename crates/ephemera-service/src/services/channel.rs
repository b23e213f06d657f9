//! Channel service
//!
//! Caller-facing operations: listen, list, create, send text and files,
//! download files, and credential checks.

use ephemera_core::{
    ByteStream, DomainError, DomainResult, FileAttachmentRecord, Message, MessageDto, StoredFile,
    Subscription,
};
use tracing::{debug, info, instrument, warn};

use super::context::ServiceContext;

/// Channel service
pub struct ChannelService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ChannelService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Open a live stream of messages sent after this call
    ///
    /// Creates the channel if it does not exist yet.
    #[instrument(skip(self, password))]
    pub async fn listen(&self, name: &str, password: &str) -> DomainResult<Subscription> {
        let channel = self.ctx.registry().get_or_create(name, password)?;
        let subscription = self.ctx.fanout().subscribe(name).await?;

        channel.resources().track_subscription(subscription.handle());
        // Destruction may have swept the tracker before we were added to it.
        if channel.is_retired() {
            subscription.close();
        }

        debug!(channel = %name, "Listener attached");
        Ok(subscription)
    }

    /// Page through history, newest first
    ///
    /// Creates the channel if it does not exist yet.
    #[instrument(skip(self, password))]
    pub async fn list_messages(
        &self,
        name: &str,
        password: &str,
        start: usize,
        limit: usize,
    ) -> DomainResult<Vec<MessageDto>> {
        self.ctx.registry().get_or_create(name, password)?;
        let messages = self.ctx.history().range(name, start, limit).await?;
        Ok(messages.iter().map(Message::to_dto).collect())
    }

    /// The most recent page of history
    pub async fn recent_messages(&self, name: &str, password: &str) -> DomainResult<Vec<MessageDto>> {
        self.list_messages(name, password, 0, self.ctx.page_size())
            .await
    }

    #[instrument(skip(self, password))]
    pub async fn create_channel(&self, name: &str, password: &str) -> DomainResult<()> {
        self.ctx.registry().create_channel(name, password)?;
        Ok(())
    }

    pub async fn send_text(&self, name: &str, password: &str, text: &str) -> DomainResult<()> {
        self.send_message(name, password, Message::text(text)).await
    }

    /// Append a message to history and publish it to live listeners
    #[instrument(skip(self, password, message))]
    pub async fn send_message(&self, name: &str, password: &str, message: Message) -> DomainResult<()> {
        let channel = self.ctx.registry().get_or_throw(name, password)?;

        let _guard = channel.lock_sends().await;
        if channel.is_retired() {
            return Err(DomainError::ChannelNotFound(name.to_string()));
        }
        self.ctx.history().append(name, &message).await?;
        let receivers = self.ctx.fanout().publish(name, &message).await?;

        debug!(channel = %name, kind = ?message.message_type(), receivers, "Message sent");
        Ok(())
    }

    /// Store a file and send it as a message, returning the attachment id
    ///
    /// Nothing is published and the stored bytes are removed if any step
    /// after the upload fails.
    #[instrument(skip(self, password, reader))]
    pub async fn send_file(
        &self,
        name: &str,
        password: &str,
        filename: &str,
        reader: ByteStream,
    ) -> DomainResult<String> {
        let channel = self.ctx.registry().get_or_throw(name, password)?;

        let stored = self.ctx.files().write(filename, reader).await?;
        let record = FileAttachmentRecord::new(name, stored.id.clone());
        let message = Message::file(stored.id.clone(), stored.location);

        let sent = async {
            let _guard = channel.lock_sends().await;
            if channel.is_retired() {
                return Err(DomainError::ChannelNotFound(name.to_string()));
            }
            channel.resources().track_attachment(record.clone());
            self.ctx
                .attachments()
                .register(&record, channel.password_hash())
                .await?;
            self.ctx.history().append(name, &message).await?;
            self.ctx.fanout().publish(name, &message).await
        }
        .await;

        match sent {
            Ok(receivers) => {
                info!(channel = %name, attachment_id = %stored.id, receivers, "File sent");
                Ok(stored.id)
            }
            Err(e) => {
                warn!(channel = %name, attachment_id = %stored.id, error = %e, "File send failed, rolling back");
                channel.resources().forget_attachment(&stored.id);
                if let Err(cleanup) = self.ctx.attachments().remove(&record).await {
                    warn!(attachment_id = %stored.id, error = %cleanup, "Failed to remove attachment record");
                }
                if let Err(cleanup) = self.ctx.files().delete(&stored.id).await {
                    warn!(attachment_id = %stored.id, error = %cleanup, "Failed to delete attachment");
                }
                Err(e)
            }
        }
    }

    /// Open an attachment for download
    ///
    /// The password is checked against the channel that owns the attachment,
    /// so a file is reachable only under its own channel name.
    #[instrument(skip(self, password))]
    pub async fn get_file(&self, name: &str, password: &str, id: &str) -> DomainResult<StoredFile> {
        let record = FileAttachmentRecord::new(name, id);
        let hash = self
            .ctx
            .attachments()
            .password_hash(&record)
            .await?
            .ok_or_else(|| DomainError::AttachmentNotFound(id.to_string()))?;

        if !self.ctx.registry().verifier().matches(password, &hash) {
            return Err(DomainError::CredentialMismatch);
        }

        self.ctx.files().read(id).await
    }

    pub fn channel_exists(&self, name: &str) -> bool {
        self.ctx.registry().exists(name)
    }

    pub fn check_credentials(&self, name: &str, password: &str) -> bool {
        self.ctx.registry().check_credentials(name, password)
    }

    /// Stop expiring channels; called once on process shutdown
    pub fn shutdown(&self) {
        self.ctx.registry().shutdown();
        info!(channels = self.ctx.registry().len(), "Channel service stopped");
    }
}
