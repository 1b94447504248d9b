//! Coordinator side-effects.
//!
//! [`CoordinatorAction`]s are instructions produced by the
//! [`crate::Coordinator`] for the runtime to execute against a driver.

use chatsync_core::Generation;
use chatsync_proto::{CreateRoomRequest, RoomId};

/// Actions produced by the Coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorAction {
    /// Render the read model.
    Render,

    /// Stop the runtime.
    Quit,

    /// Open a transport connection.
    Connect {
        /// Tag for every event the connection reports.
        generation: Generation,
        /// Room to connect to.
        room_id: RoomId,
        /// Bearer credential.
        token: String,
    },

    /// Write a frame on the open connection.
    Transmit {
        /// Connection to write on.
        generation: Generation,
        /// Frame text.
        payload: String,
    },

    /// Close a connection.
    Disconnect {
        /// Connection to close.
        generation: Generation,
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },

    /// Load recent history for a room.
    FetchHistory {
        /// Room to load.
        room_id: RoomId,
        /// Page size.
        limit: u32,
        /// Messages to skip from the newest.
        offset: u32,
    },

    /// Reload the room list.
    FetchRooms,

    /// Create a room.
    CreateRoom(CreateRoomRequest),

    /// Join a room.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
    },

    /// Leave a room.
    LeaveRoom {
        /// Room to leave.
        room_id: RoomId,
    },
}
