//! REST response and request bodies.
//!
//! The room directory and history loader are external collaborators; these
//! are the shapes they exchange with the server.

use serde::{Deserialize, Serialize};

use crate::{Message, Room};

/// Default number of messages fetched when a room is first selected.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// One page of room history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Messages newest first, as the server pages them.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Total number of messages in the room.
    #[serde(default)]
    pub total: u64,
    /// More messages exist before this page.
    #[serde(default)]
    pub has_more: bool,
}

impl HistoryPage {
    /// Page with no messages, used when a history load fails.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Room list returned by the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomList {
    /// Rooms the user belongs to (or matched a search).
    #[serde(default, rename = "chats")]
    pub rooms: Vec<Room>,
    /// Total number of matching rooms.
    #[serde(default)]
    pub total: u64,
}

/// Single room wrapped the way the directory returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEnvelope {
    /// The room.
    #[serde(rename = "chat")]
    pub room: Room,
}

/// Request body for creating a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Display name (1-100 characters).
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Create as a private room.
    #[serde(default)]
    pub is_private: bool,
    /// Membership limit. Server default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_members: Option<u32>,
}
