//! Production Environment implementation using system time.
//!
//! `SystemEnv` uses `std::time::Instant` that advances naturally and tokio
//! sleep for real wall-clock delays.

use std::time::Duration;

use chatsync_core::Environment;

/// Production environment using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[tokio::test]
    async fn system_env_sleep_works() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(50)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_millis(50), "Sleep should wait at least 50ms");
    }

    #[test]
    fn until_is_zero_for_past_deadline() {
        let env = SystemEnv::new();
        let past = env.now();
        std::thread::sleep(Duration::from_millis(1));

        assert_eq!(env.until(past), Duration::ZERO);
        assert!(env.until(env.now() + Duration::from_secs(10)) > Duration::from_secs(9));
    }
}
