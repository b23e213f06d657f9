//! Ports - the interfaces the channel core needs from its collaborators
//!
//! The domain layer defines what it needs; the local (in-process) and Redis
//! backends provide interchangeable implementations selected at startup.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::entities::{Channel, FileAttachmentRecord, Message, Subscription};
use crate::error::DomainResult;

/// Readable byte stream handed to and returned by the file store
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

// ============================================================================
// Credential Verifier
// ============================================================================

/// One-way salted password hashing
pub trait CredentialVerifier: Send + Sync {
    /// Hash a plaintext password
    fn hash(&self, plaintext: &str) -> DomainResult<String>;

    /// Check a plaintext password against a stored hash
    ///
    /// Malformed hashes never match.
    fn matches(&self, plaintext: &str, hash: &str) -> bool;
}

// ============================================================================
// History Store
// ============================================================================

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a message to a channel's history
    async fn append(&self, channel: &str, message: &Message) -> DomainResult<()>;

    /// Read up to `limit` messages starting at `start`, newest first
    ///
    /// Index 0 is the most recently appended message.
    async fn range(&self, channel: &str, start: usize, limit: usize) -> DomainResult<Vec<Message>>;

    /// Discard a channel's history
    async fn clear(&self, channel: &str) -> DomainResult<()>;
}

// ============================================================================
// Fan-out Bus
// ============================================================================

#[async_trait]
pub trait FanoutBus: Send + Sync {
    /// Publish a message to every current subscriber of a channel
    ///
    /// Returns the number of receivers reached.
    async fn publish(&self, channel: &str, message: &Message) -> DomainResult<usize>;

    /// Open a live subscription
    ///
    /// Yields only messages published after this call returns.
    async fn subscribe(&self, channel: &str) -> DomainResult<Subscription>;

    /// Terminate every open subscription for a channel
    async fn close_all(&self, channel: &str) -> DomainResult<()>;
}

// ============================================================================
// File Attachment Service
// ============================================================================

/// Result of storing a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFileInfo {
    /// Opaque public identifier
    pub id: String,
    /// Internal location; never surfaced to clients
    pub location: String,
}

/// A file opened for reading
pub struct StoredFile {
    pub filename: String,
    pub reader: ByteStream,
}

impl std::fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredFile")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store a byte stream under a fresh identifier
    async fn write(&self, filename: &str, reader: ByteStream) -> DomainResult<StoredFileInfo>;

    /// Open a stored file
    async fn read(&self, id: &str) -> DomainResult<StoredFile>;

    /// Delete a stored file
    async fn delete(&self, id: &str) -> DomainResult<()>;
}

// ============================================================================
// Attachment Index
// ============================================================================

/// Credential-gated lookup proving an attachment belongs to a channel
#[async_trait]
pub trait AttachmentIndex: Send + Sync {
    /// Record that an attachment belongs to a channel
    async fn register(&self, record: &FileAttachmentRecord, password_hash: &str)
        -> DomainResult<()>;

    /// Password hash guarding a record, `None` if the record is unknown
    async fn password_hash(&self, record: &FileAttachmentRecord) -> DomainResult<Option<String>>;

    /// Forget a record
    async fn remove(&self, record: &FileAttachmentRecord) -> DomainResult<()>;
}

// ============================================================================
// Destruction Handlers
// ============================================================================

/// Reacts to a channel being destroyed at expiry
///
/// Runs before the channel is removed from the registry, so the channel's
/// resources are still readable.
#[async_trait]
pub trait DestructionHandler: Send + Sync {
    async fn on_destroy(&self, channel: &Arc<Channel>) -> DomainResult<()>;
}
