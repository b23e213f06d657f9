//! Message entity - text and file messages exchanged in a channel

use serde::{Deserialize, Serialize};

/// Public message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    File,
}

/// A message sent to a channel
///
/// This is the internal representation stored in history and carried over
/// the fan-out bus. `File::location` is where the bytes live in the file
/// store and must never reach a client; use [`Message::to_dto`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Text { text: String },
    File { id: String, location: String },
}

impl Message {
    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a file message from a stored attachment
    pub fn file(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self::File {
            id: id.into(),
            location: location.into(),
        }
    }

    #[inline]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Text { .. } => MessageType::Text,
            Self::File { .. } => MessageType::File,
        }
    }

    /// Attachment identifier, for file messages
    pub fn attachment_id(&self) -> Option<&str> {
        match self {
            Self::File { id, .. } => Some(id),
            Self::Text { .. } => None,
        }
    }

    /// Public representation of this message
    pub fn to_dto(&self) -> MessageDto {
        match self {
            Self::Text { text } => MessageDto {
                kind: MessageType::Text,
                text: Some(text.clone()),
                id: None,
            },
            Self::File { id, .. } => MessageDto {
                kind: MessageType::File,
                text: None,
                id: Some(id.clone()),
            },
        }
    }

    /// Single-line human readable rendering
    pub fn pretty(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::File { id, .. } => format!("File message: {id}"),
        }
    }
}

/// Client-facing view of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
