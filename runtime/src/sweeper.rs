//! Expiration sweeper.
//!
//! Periodically expires `PENDING_PAYMENT` bookings whose hold lapsed and
//! returns their seats to the pool. Each booking is processed in its own
//! conflict-retried transaction; one failing booking never stops the pass.
//!
//! A `PAYMENT_PROCESSING` booking past its deadline is cancelled once its
//! hold is gone. Holds released by an earlier pass are found again through
//! [`BookingStore::processing_expired_before`], so an interrupted pass is
//! finished by the next one.
//!
//! [`BookingStore::processing_expired_before`]: cinema_booking_core::store::BookingStore::processing_expired_before

use crate::error::BookingServiceError;
use crate::metrics;
use crate::publisher::publish_committed;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::service::retry_on_conflict;
use chrono::{DateTime, Utc};
use cinema_booking_core::environment::Clock;
use cinema_booking_core::publisher::EventPublisher;
use cinema_booking_core::store::BookingRepository;
use cinema_booking_core::{Booking, BookingEvent, BookingId, BookingStatus, CancellationReason};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Sweeper settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between passes
    pub interval: Duration,
    /// Maximum bookings expired per pass
    pub batch_size: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 100,
        }
    }
}

/// A booking the sweeper could not process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    /// Booking
    pub booking_id: BookingId,
    /// What went wrong
    pub error: BookingServiceError,
}

/// Result of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Bookings moved to `EXPIRED`, each once
    pub expired: Vec<BookingId>,
    /// `PAYMENT_PROCESSING` bookings cancelled because their hold lapsed
    pub lapsed_cancelled: Vec<BookingId>,
    /// Seats returned to the pool
    pub seats_released: usize,
    /// Bookings left for the next pass
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    /// Checks if the pass changed nothing and hit no errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.lapsed_cancelled.is_empty() && self.failures.is_empty()
    }

    /// Every booking the pass expired or cancelled
    #[must_use]
    pub fn affected_bookings(&self) -> BTreeSet<BookingId> {
        self.expired.iter().chain(&self.lapsed_cancelled).copied().collect()
    }
}

struct ExpiredBooking {
    booking: Booking,
    released: usize,
    surfaced: BTreeSet<BookingId>,
}

/// Background task that expires lapsed holds
pub struct ExpirationSweeper<R, P, K> {
    repository: R,
    publisher: P,
    clock: K,
    retry: RetryPolicy,
    config: SweeperConfig,
}

impl<R, P, K> ExpirationSweeper<R, P, K>
where
    R: BookingRepository,
    P: EventPublisher,
    K: Clock,
{
    /// Create a sweeper. `retry` bounds re-runs after version conflicts.
    #[must_use]
    pub const fn new(
        repository: R,
        publisher: P,
        clock: K,
        retry: RetryPolicy,
        config: SweeperConfig,
    ) -> Self {
        Self {
            repository,
            publisher,
            clock,
            retry,
            config,
        }
    }

    /// Run passes every `interval` until `shutdown` fires.
    ///
    /// A pass that cannot even query due bookings is logged and retried on
    /// the next tick.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "Expiration sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Expiration sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.is_empty() => {}
                        Ok(report) => tracing::info!(
                            expired = report.expired.len(),
                            lapsed_cancelled = report.lapsed_cancelled.len(),
                            seats_released = report.seats_released,
                            failures = report.failures.len(),
                            "Sweep pass complete"
                        ),
                        Err(e) => tracing::error!(error = %e, "Sweep pass failed"),
                    }
                }
            }
        }
    }

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Returns [`BookingServiceError::Store`] if due or lapsed bookings cannot
    /// be queried. Per-booking failures are reported in
    /// [`SweepReport::failures`] instead.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport, BookingServiceError> {
        let started = Instant::now();
        let now = self.clock.now();
        let due = self
            .repository
            .pending_expired_before(now, self.config.batch_size)
            .await?;

        let mut report = SweepReport::default();
        let mut surfaced = BTreeSet::new();

        for booking in due {
            let booking_id = booking.id();
            match self.expire_booking(booking_id, now).await {
                Ok(Some(expired)) => {
                    report.seats_released += expired.released;
                    surfaced.extend(expired.surfaced);
                    report.expired.push(booking_id);
                    tracing::info!(%booking_id, released = expired.released, "Booking expired");
                    metrics::record_booking("expired");
                    publish_committed(
                        &self.publisher,
                        BookingEvent::BookingExpired {
                            booking_id,
                            showtime_id: expired.booking.showtime_id(),
                            seats: expired.booking.seat_numbers(),
                            occurred_at: now,
                        },
                    )
                    .await;
                }
                Ok(None) => tracing::debug!(%booking_id, "Booking no longer due; skipped"),
                Err(error) => {
                    tracing::warn!(%booking_id, error = %error, "Failed to expire booking");
                    report.failures.push(SweepFailure { booking_id, error });
                }
            }
        }

        let lapsed = self
            .repository
            .processing_expired_before(now, self.config.batch_size)
            .await?;
        surfaced.extend(lapsed.iter().map(Booking::id));

        for booking_id in surfaced {
            if report.expired.contains(&booking_id) {
                continue;
            }
            match self.cancel_lapsed(booking_id, now).await {
                Ok(Some((booking, released))) => {
                    report.seats_released += released;
                    report.lapsed_cancelled.push(booking_id);
                    tracing::info!(%booking_id, "Payment window lapsed; booking cancelled");
                    metrics::record_booking("cancelled");
                    publish_committed(
                        &self.publisher,
                        BookingEvent::BookingCancelled {
                            booking_id,
                            showtime_id: booking.showtime_id(),
                            seats: booking.seat_numbers(),
                            reason: CancellationReason::HoldLapsed,
                            occurred_at: now,
                        },
                    )
                    .await;
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%booking_id, error = %error, "Failed to cancel lapsed booking");
                    report.failures.push(SweepFailure { booking_id, error });
                }
            }
        }

        metrics::record_seats_released("sweeper", report.seats_released);
        metrics::record_sweep(started.elapsed().as_secs_f64(), report.failures.len());
        Ok(report)
    }

    async fn expire_booking(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<ExpiredBooking>, BookingServiceError> {
        retry_with_predicate(
            &self.retry,
            "expire_booking",
            || self.try_expire_booking(booking_id, now),
            retry_on_conflict("expire_booking"),
        )
        .await
    }

    async fn try_expire_booking(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<ExpiredBooking>, BookingServiceError> {
        let Some(mut booking) = self.repository.booking_by_id(booking_id).await? else {
            return Err(BookingServiceError::BookingNotFound(booking_id));
        };
        // Paid or cancelled since the query ran.
        if !booking.is_hold_expired(now) {
            return Ok(None);
        }
        let mut inventory = self
            .repository
            .inventory_by_showtime(booking.showtime_id())
            .await?
            .ok_or(BookingServiceError::InventoryMissing(booking.showtime_id()))?;

        let expired_holds = inventory.release_expired_holds(now);
        let released_own = inventory.release_seats(&booking.seat_numbers(), booking_id);
        booking.expire(now)?;
        self.repository.save_all(&mut inventory, &mut booking).await?;

        let mut surfaced = expired_holds.bookings;
        surfaced.remove(&booking_id);
        Ok(Some(ExpiredBooking {
            booking,
            released: expired_holds.released_seats.len() + released_own,
            surfaced,
        }))
    }

    async fn cancel_lapsed(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<(Booking, usize)>, BookingServiceError> {
        retry_with_predicate(
            &self.retry,
            "cancel_lapsed",
            || async {
                let Some(mut booking) = self.repository.booking_by_id(booking_id).await? else {
                    return Ok(None);
                };
                // Pending bookings are picked up by the expiry query.
                if booking.status() != BookingStatus::PaymentProcessing
                    || now <= booking.hold_expires_at()
                {
                    return Ok(None);
                }
                let mut inventory = self
                    .repository
                    .inventory_by_showtime(booking.showtime_id())
                    .await?
                    .ok_or(BookingServiceError::InventoryMissing(booking.showtime_id()))?;
                // Hold still intact; a late payment can still confirm it.
                if inventory.is_held_by(&booking.seat_numbers(), booking_id) {
                    return Ok(None);
                }

                booking.cancel(now)?;
                let released = inventory.release_seats(&booking.seat_numbers(), booking_id);
                self.repository.save_all(&mut inventory, &mut booking).await?;
                Ok::<_, BookingServiceError>(Some((booking, released)))
            },
            retry_on_conflict("cancel_lapsed"),
        )
        .await
    }
}
