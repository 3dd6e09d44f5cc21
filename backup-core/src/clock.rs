//! Time source and delay provider for simulated operations.
//!
//! Operations never call `tokio::time` directly; they go through a [`Clock`]
//! so a host can substitute its own notion of time.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Wall-clock timestamp used for `created_at` and event timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling task for `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Clock backed by tokio timers.
///
/// Under `#[tokio::test(start_paused = true)]` the timers advance
/// deterministically, which is how the stage delays are tested.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_follows_paused_time() {
        let clock = TokioClock;
        let start = tokio::time::Instant::now();
        clock.sleep(Duration::from_millis(1500)).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1600));
    }
}
