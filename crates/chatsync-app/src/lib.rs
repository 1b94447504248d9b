//! Application layer for chatsync.
//!
//! Pure state machines and a generic runtime, so the same orchestration code
//! runs in production and in deterministic simulation.
//!
//! # Components
//!
//! - [`Store`]: ordered per-room message histories and the room summary list
//! - [`Coordinator`]: owns the active room, its transport session and the
//!   read model consumers render
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: generic orchestration loop over a [`Driver`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod coordinator;
mod driver;
mod error;
mod event;
mod runtime;
mod store;

pub use action::CoordinatorAction;
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use driver::Driver;
pub use error::ConnectionError;
pub use event::{Command, CoordinatorEvent};
pub use runtime::Runtime;
pub use store::Store;
