//! Coordinator input events.
//!
//! Events come from three sources:
//! - User commands.
//! - Transport events, tagged with the generation of the connection.
//! - Completions of REST calls the coordinator asked for.

use chatsync_core::{Generation, TransportEvent};
use chatsync_proto::{CreateRoomRequest, HistoryPage, MessageId, MessageType, Room, RoomId};

/// User-initiated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Make a room the active room.
    Select(RoomId),
    /// Create a room and select it.
    Create(CreateRoomRequest),
    /// Join a room.
    Join(RoomId),
    /// Leave a room.
    Leave(RoomId),
    /// Reload the room list.
    RefreshRooms,
    /// Send a message to the active room.
    Send {
        /// Message text.
        content: String,
        /// Message type tag.
        message_type: MessageType,
        /// Message being replied to.
        reply_to_id: Option<MessageId>,
    },
    /// Close everything and stop.
    Quit,
}

/// Events processed by the Coordinator.
///
/// REST failures are carried as their display text. They are never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// User command.
    Command(Command),

    /// Periodic tick. Fires due reconnects.
    Tick,

    /// Event from the transport connection tagged `generation`.
    Transport {
        /// Connection that produced the event.
        generation: Generation,
        /// The event.
        event: TransportEvent,
    },

    /// History request completed.
    HistoryLoaded {
        /// Room the history belongs to.
        room_id: RoomId,
        /// Loaded page, or the failure text.
        result: Result<HistoryPage, String>,
    },

    /// Room list request completed.
    RoomsLoaded(Result<Vec<Room>, String>),

    /// Create request completed.
    RoomCreated(Result<Room, String>),

    /// Join request completed.
    RoomJoined {
        /// Room that was joined.
        room_id: RoomId,
        /// Outcome.
        result: Result<(), String>,
    },

    /// Leave request completed.
    RoomLeft {
        /// Room that was left.
        room_id: RoomId,
        /// Outcome.
        result: Result<(), String>,
    },
}

impl From<Command> for CoordinatorEvent {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}
