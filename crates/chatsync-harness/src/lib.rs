//! Deterministic simulation harness for chatsync.
//!
//! Runs the production [`chatsync_app::Runtime`] over a scripted driver and a
//! virtual clock, so reconnect backoff, room switches and transport faults can
//! be replayed exactly and fast-forwarded.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties after every step.
//! Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! set.
//!
//! # Chaos
//!
//! [`ChaosScript`] generates seeded sequences of user commands, inbound
//! frames, transport faults and clock jumps for a [`Simulation`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;
pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod simulation;

pub use chaos::{ChaosScript, ChaosStep};
pub use invariants::{
    AtMostOneLiveConnection, HistoryAppendOnly, Invariant, InvariantRegistry, InvariantResult,
    ReconnectBounded, SessionBoundToActiveRoom, SystemSnapshot, Violation,
};
pub use sim_driver::{ConnectBehavior, ConnectRecord, SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use simulation::{Simulation, message_frame, test_message};
