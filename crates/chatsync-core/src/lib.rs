//! Connection lifecycle core for chatsync.
//!
//! Pure state machines with no I/O. Callers feed in transport events and the
//! current time; the state machines return actions for a driver to execute.
//!
//! # Components
//!
//! - [`Session`]: one live transport connection at a time, bound to a room,
//!   with generation tagging and exponential-backoff reconnects
//! - [`Dispatcher`]: decodes inbound frames into [`DomainEvent`]s
//! - [`Environment`]: time source abstraction for deterministic simulation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod session;

pub use backoff::{ReconnectTimer, SessionConfig};
pub use dispatch::{CloseKind, Dispatcher, DomainEvent, classify_close};
pub use env::{Environment, Instant};
pub use error::{ConnectionFault, DecodeError, SendRejected};
pub use session::{
    ConnectionState, Generation, Session, SessionAction, SessionStatus, TransportEvent,
};
