//! Reconnect backoff policy and the deferred reconnect handle.
//!
//! Delay for attempt `n` (zero-based) is `min(base_delay * 2^n, max_delay)`.
//! After `max_attempts` scheduled reconnects without a successful open, the
//! next failure is terminal for that attempt.

use std::time::Duration;

use crate::{env::Instant, session::Generation};

/// Base delay before the first reconnect.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on any single reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Reconnects scheduled before the session gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Cap applied to the exponential delay.
    pub max_delay: Duration,
    /// Consecutive reconnects allowed before the session fails.
    pub max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    /// Delay before reconnect attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Handle to a scheduled reconnect.
///
/// Returned when a reconnect is scheduled and dropped when it fires or is
/// cancelled. The generation it was scheduled from is recorded so a fired
/// timer can be traced back to the connection that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectTimer<I> {
    /// Generation whose failure scheduled this reconnect.
    pub generation: Generation,
    /// One-based reconnect attempt this timer will start.
    pub attempt: u32,
    /// Delay that was applied.
    pub delay: Duration,
    /// When the reconnect fires.
    pub deadline: I,
}

impl<I: Instant> ReconnectTimer<I> {
    /// Returns true if the timer should fire at `now`.
    pub fn is_due(&self, now: I) -> bool {
        now >= self.deadline
    }
}
