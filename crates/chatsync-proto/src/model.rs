//! Room and message records.
//!
//! These are the entities the store holds. They are created by the server
//! (pushed over the transport or returned by REST calls) and are immutable from
//! the client's point of view: the store only appends messages and replaces
//! room summaries.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Server-assigned room identifier.
pub type RoomId = u64;

/// Server-assigned message identifier.
pub type MessageId = u64;

/// Server-assigned user identifier.
pub type UserId = u64;

/// Summary of a chat room as shown in the room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Private rooms are invite-only and hidden from search.
    #[serde(default)]
    pub is_private: bool,
    /// Number of members currently in the room.
    #[serde(default)]
    pub current_members: u32,
    /// Membership limit.
    #[serde(default)]
    pub max_members: u32,
    /// Most recent message, denormalized for list previews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
}

impl Room {
    /// Create a public room summary with no members and no preview.
    pub fn new(id: RoomId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            is_private: false,
            current_members: 0,
            max_members: 0,
            last_message: None,
        }
    }
}

/// A chat message.
///
/// `created_at` is non-decreasing in a room's arrival order but is neither
/// unique nor gap-free. `reply_to_id` is a weak reference: the referenced
/// message may never have been loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Room the message belongs to.
    #[serde(rename = "chat_id")]
    pub room_id: RoomId,
    /// Author's user id.
    pub user_id: UserId,
    /// Author's display name at the time of sending.
    pub username: String,
    /// Text payload.
    pub content: String,
    /// Message type tag (`text`, `image`, `file`, `system`).
    ///
    /// Kept as the raw tag so a newer server can introduce types without
    /// older clients dropping the frame. See [`Message::kind`].
    #[serde(default = "default_message_type")]
    pub message_type: String,
    /// Message this one replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    /// Server timestamp.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Parsed message type. `None` if the tag is not one this client knows.
    pub fn kind(&self) -> Option<MessageType> {
        self.message_type.parse().ok()
    }
}

fn default_message_type() -> String {
    MessageType::Text.as_str().to_string()
}

/// Message type accepted by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// Image reference.
    Image,
    /// File reference.
    File,
    /// System-generated notice.
    System,
}

impl MessageType {
    /// Wire tag for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            "system" => Ok(Self::System),
            other => Err(ProtocolError::UnknownMessageType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uses_server_field_names() {
        let json = r#"{
            "id": 7,
            "chat_id": 3,
            "user_id": 11,
            "username": "alice",
            "content": "hi",
            "message_type": "text",
            "created_at": "2024-05-01T12:00:00Z"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, 7);
        assert_eq!(msg.room_id, 3);
        assert_eq!(msg.reply_to_id, None);
        assert_eq!(msg.kind(), Some(MessageType::Text));
    }

    #[test]
    fn message_ignores_fields_it_does_not_model() {
        let json = r#"{
            "id": 1, "chat_id": 1, "user_id": 1, "username": "bob",
            "content": "x", "message_type": "image", "reply_to_id": 9,
            "is_deleted": false, "updated_at": "2024-05-01T12:00:00Z",
            "created_at": "2024-05-01T12:00:00Z"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.reply_to_id, Some(9));
        assert_eq!(msg.kind(), Some(MessageType::Image));
    }

    #[test]
    fn unknown_message_type_is_kept_verbatim() {
        let json = r#"{
            "id": 1, "chat_id": 1, "user_id": 1, "username": "bob",
            "content": "x", "message_type": "sticker",
            "created_at": "2024-05-01T12:00:00Z"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, "sticker");
        assert_eq!(msg.kind(), None);
    }

    #[test]
    fn missing_message_type_defaults_to_text() {
        let json = r#"{
            "id": 1, "chat_id": 1, "user_id": 1, "username": "bob",
            "content": "x", "created_at": "2024-05-01T12:00:00Z"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, "text");
    }

    #[test]
    fn room_defaults_optional_fields() {
        let room: Room = serde_json::from_str(r#"{"id": 5, "name": "general"}"#).unwrap();
        assert_eq!(room, Room::new(5, "general"));
    }

    #[test]
    fn message_type_parse() {
        assert_eq!("file".parse::<MessageType>().unwrap(), MessageType::File);
        assert!(matches!(
            "video".parse::<MessageType>(),
            Err(ProtocolError::UnknownMessageType(t)) if t == "video"
        ));
    }
}
