//! Booking service configuration.

use crate::retry::RetryPolicy;
use chrono::Duration;
use cinema_booking_core::{Currency, Money};
use std::time::Duration as StdDuration;

/// Default seat hold: 15 minutes
pub const DEFAULT_HOLD_MINUTES: i64 = 15;

/// Default maximum seats per booking
pub const DEFAULT_MAX_SEATS_PER_BOOKING: usize = 8;

/// Configuration passed to the booking service at construction.
///
/// # Example
///
/// ```
/// use cinema_booking_runtime::config::BookingConfig;
/// use cinema_booking_core::{Currency, Money};
/// use chrono::Duration;
///
/// let config = BookingConfig::default()
///     .with_hold_duration(Duration::minutes(10))
///     .with_service_fee(Money::new(250_000, Currency::IDR));
/// assert_eq!(config.hold_duration, Duration::minutes(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfig {
    /// How long seats stay held waiting for payment
    pub hold_duration: Duration,
    /// Fee added to every booking; its currency must match ticket prices
    pub service_fee: Money,
    /// Upper bound on seats in one booking
    pub max_seats_per_booking: usize,
    /// Retries of a whole load-mutate-save step after a version conflict
    pub conflict_retry: RetryPolicy,
    /// Retries of transient payment gateway failures
    pub gateway_retry: RetryPolicy,
    /// Retries of transient artifact storage failures
    pub artifact_retry: RetryPolicy,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(DEFAULT_HOLD_MINUTES),
            service_fee: Money::zero(Currency::IDR),
            max_seats_per_booking: DEFAULT_MAX_SEATS_PER_BOOKING,
            conflict_retry: RetryPolicy::builder()
                .max_retries(5)
                .initial_delay(StdDuration::from_millis(5))
                .max_delay(StdDuration::from_millis(200))
                .build(),
            gateway_retry: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(StdDuration::from_millis(200))
                .max_delay(StdDuration::from_secs(5))
                .build(),
            artifact_retry: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(StdDuration::from_millis(500))
                .max_delay(StdDuration::from_secs(10))
                .build(),
        }
    }
}

impl BookingConfig {
    /// Set the hold duration.
    #[must_use]
    pub const fn with_hold_duration(mut self, hold_duration: Duration) -> Self {
        self.hold_duration = hold_duration;
        self
    }

    /// Set the service fee.
    #[must_use]
    pub const fn with_service_fee(mut self, service_fee: Money) -> Self {
        self.service_fee = service_fee;
        self
    }

    /// Set the maximum seats per booking.
    #[must_use]
    pub const fn with_max_seats_per_booking(mut self, max: usize) -> Self {
        self.max_seats_per_booking = max;
        self
    }

    /// Set the conflict retry policy.
    #[must_use]
    pub fn with_conflict_retry(mut self, policy: RetryPolicy) -> Self {
        self.conflict_retry = policy;
        self
    }

    /// Set the gateway retry policy.
    #[must_use]
    pub fn with_gateway_retry(mut self, policy: RetryPolicy) -> Self {
        self.gateway_retry = policy;
        self
    }

    /// Set the artifact retry policy.
    #[must_use]
    pub fn with_artifact_retry(mut self, policy: RetryPolicy) -> Self {
        self.artifact_retry = policy;
        self
    }
}
