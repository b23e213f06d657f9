//! # ephemera-core
//!
//! Domain layer containing channel entities, messages, per-channel resource
//! tracking, and the traits implemented by the distribution backends.
//! This crate has zero dependencies on infrastructure (Redis, filesystem, etc.).

pub mod entities;
pub mod error;
pub mod traits;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, ChannelResource, FileAttachmentRecord, LiveResource, Message, MessageDto,
    MessageType, ResourceTracker, Subscription, SubscriptionHandle,
};
pub use error::{DomainError, DomainResult};
pub use traits::{
    AttachmentIndex, ByteStream, CredentialVerifier, DestructionHandler, FanoutBus, FileStore,
    HistoryStore, StoredFile, StoredFileInfo,
};
