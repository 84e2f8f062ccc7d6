//! Wall-clock time source for payload timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

/// Time source used to stamp published payloads.
///
/// # Example
///
/// ```rust
/// use iot_fleet_sim::hal::MockClock;
/// use iot_fleet_sim::traits::Clock;
///
/// let mut clock = MockClock::new();
/// let start = clock.now();
/// clock.advance_ms(1500);
/// assert_eq!((clock.now() - start).num_milliseconds(), 1500);
/// ```
pub trait Clock {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Current time as an ISO-8601 string with millisecond precision,
    /// e.g. `2025-01-01T12:00:00.000Z`.
    fn timestamp(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
