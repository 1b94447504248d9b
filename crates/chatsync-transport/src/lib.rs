//! Production I/O for chatsync.
//!
//! Thin layer under the Sans-IO core: it only moves frames and REST payloads.
//! Lifecycle decisions stay in [`chatsync_core::Session`].
//!
//! - [`Endpoint`]: REST and WebSocket URLs derived from one server origin
//! - [`ws`]: one WebSocket task per connection generation
//! - [`RestClient`]: room directory and history loader
//! - [`SystemEnv`]: wall-clock [`chatsync_core::Environment`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod endpoint;
mod error;
mod rest;
mod system_env;
pub mod ws;

pub use endpoint::Endpoint;
pub use error::{RestError, TransportError};
pub use rest::RestClient;
pub use system_env::SystemEnv;
pub use ws::{Connection, Outbound};
