//! Line-oriented terminal client for chatsync.
//!
//! A thin shell over [`chatsync_app::Driver`] that reads commands from stdin
//! and prints the read model to stdout. All orchestration logic lives in the
//! generic [`chatsync_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod input;
pub mod render;
pub mod terminal;

pub use chatsync_app::{Command, Coordinator, CoordinatorConfig, Driver, Runtime};
pub use input::{Input, InputError};
pub use render::Renderer;
pub use terminal::{TerminalDriver, TerminalError};
