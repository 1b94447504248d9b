//! Environment abstraction for deterministic testing.
//!
//! Decouples lifecycle logic from the system clock. Production uses real time
//! and tokio timers; simulation uses a virtual clock that tests fast-forward.

use std::{
    fmt::Debug,
    ops::{Add, Sub},
    time::Duration,
};

/// Point in time usable by the state machines.
///
/// Implemented for `std::time::Instant` and for any virtual instant with the
/// same arithmetic.
pub trait Instant:
    Copy + Ord + Send + Sync + Debug + Add<Duration, Output = Self> + Sub<Output = Duration>
{
}

impl<T> Instant for T where
    T: Copy + Ord + Send + Sync + Debug + Add<Duration, Output = T> + Sub<Output = Duration>
{
}

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation uses a
    /// virtual instant.
    type Instant: Instant;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only drivers call this. State machines take time as a parameter.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Time remaining until `deadline`, zero if it has passed.
    fn until(&self, deadline: Self::Instant) -> Duration {
        let now = self.now();
        if deadline > now { deadline - now } else { Duration::ZERO }
    }
}
