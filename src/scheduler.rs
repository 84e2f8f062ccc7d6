//! The single recurring publish timer.
//!
//! [`PublishScheduler`] owns exactly one `tokio` interval. It is polled from a
//! single loop, so [`reschedule`](PublishScheduler::reschedule) swaps the
//! timer between two polls: the old interval is dropped before the new one
//! exists and no tick can fire in between.
//!
//! The first tick after creation or a reschedule fires one full period later.
//! If the loop falls behind, missed ticks are delayed rather than burst.
//!
//! ```rust
//! use std::time::Duration;
//! use iot_fleet_sim::scheduler::PublishScheduler;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut scheduler = PublishScheduler::new(Duration::from_millis(3000));
//! assert_eq!(scheduler.period(), Duration::from_millis(3000));
//!
//! scheduler.reschedule(Duration::from_millis(1000));
//! assert_eq!(scheduler.period(), Duration::from_millis(1000));
//! # }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Default publish period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(3000);

/// Owned handle to the publish timer.
#[derive(Debug)]
pub struct PublishScheduler {
    period: Duration,
    interval: Interval,
}

impl PublishScheduler {
    /// Start a timer whose first tick fires one `period` from now.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: Self::start(period),
        }
    }

    fn start(period: Duration) -> Interval {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    /// Current period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick. Cancel-safe.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    /// Replace the running timer with one of the new period.
    ///
    /// The next tick fires one new period from now.
    pub fn reschedule(&mut self, period: Duration) {
        tracing::debug!(
            old_ms = self.period.as_millis() as u64,
            new_ms = period.as_millis() as u64,
            "rescheduling publish timer"
        );
        self.period = period;
        self.interval = Self::start(period);
    }
}

impl Default for PublishScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period() {
        let start = Instant::now();
        let mut scheduler = PublishScheduler::new(Duration::from_millis(3000));

        let fired = scheduler.tick().await;
        assert_eq!(fired - start, Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_repeat_at_period() {
        let mut scheduler = PublishScheduler::new(Duration::from_millis(1000));
        let first = scheduler.tick().await;
        let second = scheduler.tick().await;
        let third = scheduler.tick().await;
        assert_eq!(second - first, Duration::from_millis(1000));
        assert_eq!(third - second, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_uses_new_period() {
        let mut scheduler = PublishScheduler::new(Duration::from_millis(3000));
        let first = scheduler.tick().await;

        scheduler.reschedule(Duration::from_millis(1000));
        let second = scheduler.tick().await;
        let third = scheduler.tick().await;

        assert_eq!(second - first, Duration::from_millis(1000));
        assert_eq!(third - second, Duration::from_millis(1000));
        assert_eq!(scheduler.period(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_mid_period_never_fires_early() {
        let mut scheduler = PublishScheduler::new(Duration::from_millis(3000));
        let first = scheduler.tick().await;

        time::advance(Duration::from_millis(2500)).await;
        let changed_at = Instant::now();
        scheduler.reschedule(Duration::from_millis(1000));

        // the old timer would have fired 500ms from here; the new one waits 1000ms
        let next = scheduler.tick().await;
        assert_eq!(next - changed_at, Duration::from_millis(1000));
        assert!(next - first >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn lengthening_period_waits_full_new_period() {
        let mut scheduler = PublishScheduler::new(Duration::from_millis(1000));
        scheduler.tick().await;

        let changed_at = Instant::now();
        scheduler.reschedule(Duration::from_millis(5000));

        let next = scheduler.tick().await;
        assert_eq!(next - changed_at, Duration::from_millis(5000));
    }
}
