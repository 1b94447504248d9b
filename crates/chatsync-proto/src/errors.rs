//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding, decoding or validating wire records.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame text is not a well-formed record of the expected shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Message type tag is not one the server accepts.
    #[error("unknown message type: {0:?}")]
    UnknownMessageType(String),

    /// Outbound content is empty (or whitespace only).
    #[error("message content cannot be empty")]
    EmptyContent,

    /// Outbound content exceeds [`crate::frame::MAX_CONTENT_LEN`] bytes.
    #[error("message content too long: {len} bytes (max {max})")]
    ContentTooLong {
        /// Actual content length in bytes.
        len: usize,
        /// Maximum accepted length in bytes.
        max: usize,
    },
}
