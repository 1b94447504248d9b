//! Transport error types.

use thiserror::Error;

/// WebSocket transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Server origin cannot be turned into a transport URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// No connection with this generation.
    #[error("no connection for generation {0}")]
    UnknownConnection(u64),

    /// Connection task is gone or its queue is full.
    #[error("connection closed")]
    Closed,
}

/// REST collaborator errors.
#[derive(Debug, Error)]
pub enum RestError {
    /// Request could not be sent or the response body was unreadable.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error text from the response body, or the status reason.
        message: String,
    },

    /// Request URL could not be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
