//! Traits implemented by the backends

mod ports;

pub use ports::{
    AttachmentIndex, ByteStream, CredentialVerifier, DestructionHandler, FanoutBus, FileStore,
    HistoryStore, StoredFile, StoredFileInfo,
};
