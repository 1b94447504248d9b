//! Error types for the connection lifecycle core.
//!
//! None of these are fatal to the process. Connection faults are retried or
//! summarized as status, decode faults drop a single frame, and send
//! rejections are returned to the caller as ordinary values.

use chatsync_proto::ProtocolError;
use thiserror::Error;

use crate::session::SessionStatus;

/// Fault recorded as the session's `last_error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFault {
    /// Transport could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Established connection dropped without an intentional close.
    #[error("connection closed abnormally (code {code}): {reason}")]
    AbnormalClose {
        /// Close code reported by the transport.
        code: u16,
        /// Close reason reported by the transport.
        reason: String,
    },

    /// Automatic reconnection gave up.
    ///
    /// Only an explicit new `open` (re-selecting the room) retries.
    #[error("gave up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        /// Reconnect attempts made before giving up.
        attempts: u32,
    },
}

impl ConnectionFault {
    /// Returns true if the session will retry on its own after this fault.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::ReconnectExhausted { .. })
    }
}

/// Send attempted while the session is not open.
///
/// An expected outcome, not a fault: the frame was not handed to the
/// transport and nothing changed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("send rejected: session is {status:?}")]
pub struct SendRejected {
    /// Session status at the time of the attempt.
    pub status: SessionStatus,
}

/// Inbound frame could not be decoded.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Frame text is not a message or notice record.
    #[error("malformed frame ({len} bytes): {source}")]
    Malformed {
        /// Length of the offending frame in bytes.
        len: usize,
        /// Underlying protocol error.
        #[source]
        source: ProtocolError,
    },
}
