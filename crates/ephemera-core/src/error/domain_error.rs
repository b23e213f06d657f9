//! Domain errors - error types for the domain layer

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Channel already exists: {0}")]
    AlreadyExists(String),

    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    // =========================================================================
    // Credential Errors
    // =========================================================================
    #[error("Password does not match")]
    CredentialMismatch,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Get an error code string for responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "CHANNEL_ALREADY_EXISTS",
            Self::ChannelNotFound(_) => "UNKNOWN_CHANNEL",
            Self::AttachmentNotFound(_) => "UNKNOWN_ATTACHMENT",
            Self::CredentialMismatch => "CREDENTIAL_MISMATCH",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Backend(_) => "BACKEND_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChannelNotFound(_) | Self::AttachmentNotFound(_))
    }

    /// Check if this is a credential error
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::CredentialMismatch)
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Check if this is a failure of the byte store or a networked backend
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Backend(_))
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
