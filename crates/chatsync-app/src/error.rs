//! Errors returned to callers of the Coordinator.

use chatsync_proto::ProtocolError;
use thiserror::Error;

/// Why a message could not be sent to the active room.
///
/// Returned as a value; the coordinator state is unchanged.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// No room is selected.
    #[error("no active room")]
    NoActiveRoom,

    /// The transport session is not open.
    #[error("not connected")]
    NotConnected,

    /// The outbound frame could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}
