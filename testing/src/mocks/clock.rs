//! Deterministic clocks.

use chrono::{DateTime, Duration, Utc};
use cinema_booking_core::environment::Clock;
use std::sync::{Arc, Mutex};

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use cinema_booking_testing::mocks::FixedClock;
/// use cinema_booking_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// Clock that only moves when the test advances it.
///
/// Clones share the same time, so a test can keep one handle and pass
/// another to the service under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a manual clock starting at `start`
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap();
        *time += by;
    }

    /// Jump to an absolute time
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn set(&self, to: DateTime<Utc>) {
        *self.time.lock().unwrap() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(test_clock().now())
    }
}

impl Clock for ManualClock {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap()
    }
}
