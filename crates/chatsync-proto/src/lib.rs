//! Wire types for the chatsync room protocol.
//!
//! Everything that crosses the transport or the REST boundary is defined here:
//! the [`Room`] and [`Message`] records, the outbound frame a client writes
//! ([`OutboundMessage`]), the inbound frames a server pushes
//! ([`InboundFrame`]), and the close codes that separate an intentional
//! disconnect from a dropped connection.
//!
//! Frames are UTF-8 JSON text, one record per frame. Field names follow the
//! server's snake_case convention (`chat_id`, `message_type`, ...).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod close;
pub mod errors;
pub mod frame;
pub mod model;
pub mod rest;

pub use errors::{ProtocolError, Result};
pub use frame::{InboundFrame, MAX_CONTENT_LEN, NoticeKind, OutboundMessage, ServerNotice};
pub use model::{Message, MessageId, MessageType, Room, RoomId, UserId};
pub use rest::{CreateRoomRequest, DEFAULT_HISTORY_LIMIT, HistoryPage, RoomEnvelope, RoomList};
