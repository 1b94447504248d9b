//! Virtual-clock environment.
//!
//! Time only moves when a test advances it. `sleep` advances the clock by the
//! requested duration and completes immediately, so a reconnect backoff of
//! thirty seconds costs nothing to simulate.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    ops::{Add, Sub},
    sync::{Arc, Mutex},
    time::Duration,
};

use chatsync_core::Environment;

/// Instant on the virtual clock: time elapsed since the simulation started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Simulation start.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Time since simulation start.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Environment backed by a shared virtual clock.
///
/// Clones share the clock.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    clock: Arc<Mutex<Duration>>,
}

impl SimEnv {
    /// Create an environment at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        *clock += duration;
    }

    /// Move the clock forward to `instant`. No-op if it is in the past.
    pub fn advance_to(&self, instant: SimInstant) {
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        if instant.0 > *clock {
            *clock = instant.0;
        }
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(*self.clock.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_moves_when_advanced() {
        let env = SimEnv::new();
        assert_eq!(env.now(), SimInstant::ZERO);

        env.advance(Duration::from_millis(1500));
        assert_eq!(env.now().elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn clones_share_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        other.advance(Duration::from_secs(2));
        assert_eq!(env.now().elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn advance_to_never_rewinds() {
        let env = SimEnv::new();
        env.advance(Duration::from_secs(5));
        env.advance_to(SimInstant::ZERO + Duration::from_secs(1));

        assert_eq!(env.now().elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn sleep_advances_clock() {
        let env = SimEnv::new();
        futures::executor::block_on(env.sleep(Duration::from_secs(30)));

        assert_eq!(env.now().elapsed(), Duration::from_secs(30));
        assert_eq!(env.until(SimInstant::ZERO), Duration::ZERO);
    }
}
