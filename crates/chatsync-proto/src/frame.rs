//! Transport frames.
//!
//! One JSON record per text frame in each direction:
//!
//! - client → server: [`OutboundMessage`]
//! - server → client: [`InboundFrame`], either a broadcast [`Message`] or a
//!   [`ServerNotice`] rejecting something the client sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Message, MessageId, MessageType, ProtocolError, Result};

/// Largest content the server accepts, in bytes.
pub const MAX_CONTENT_LEN: usize = 4000;

/// Message a client writes to the transport.
///
/// Construction does not validate; call [`OutboundMessage::validate`] before
/// handing user input to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Text payload. Must be non-empty for the server to accept it.
    pub content: String,
    /// Message type tag.
    #[serde(default)]
    pub message_type: MessageType,
    /// Message being replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
}

impl OutboundMessage {
    /// Create an outbound message.
    pub fn new(
        content: impl Into<String>,
        message_type: MessageType,
        reply_to_id: Option<MessageId>,
    ) -> Self {
        Self { content: content.into(), message_type, reply_to_id }
    }

    /// Create a plain text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, MessageType::Text, None)
    }

    /// Check the constraints the server enforces on inbound messages.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyContent` if content is empty or whitespace
    /// - `ProtocolError::ContentTooLong` if content exceeds
    ///   [`MAX_CONTENT_LEN`] bytes
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(ProtocolError::EmptyContent);
        }

        let len = self.content.len();
        if len > MAX_CONTENT_LEN {
            return Err(ProtocolError::ContentTooLong { len, max: MAX_CONTENT_LEN });
        }

        Ok(())
    }

    /// Encode as frame text.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Kind tag carried by server notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// Server rejected something the client sent.
    Error,
}

/// Out-of-band notice pushed by the server on the message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerNotice {
    /// Notice kind.
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    /// Human-readable description.
    pub message: String,
    /// Server time the notice was generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl ServerNotice {
    /// Create an error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, message: message.into(), time: None }
    }
}

/// Any frame the server pushes to a client.
///
/// Notices are tried first: they carry a `type` field that message records
/// never have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    /// Server notice.
    Notice(ServerNotice),
    /// Broadcast chat message.
    Message(Message),
}

impl InboundFrame {
    /// Decode frame text.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as frame text.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<Message> for InboundFrame {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}
