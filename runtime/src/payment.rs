//! Payment gateway callback handling.
//!
//! Callbacks are delivered at least once and may race the expiration
//! sweeper, so every outcome is decided against freshly loaded state and
//! replays of an applied callback are acknowledged without side effects.

use crate::error::BookingServiceError;
use crate::metrics;
use crate::publisher::publish_committed;
use crate::retry::retry_with_predicate;
use crate::service::{BookingService, retry_on_conflict};
use cinema_booking_core::catalog::ShowtimeCatalog;
use cinema_booking_core::environment::Clock;
use cinema_booking_core::gateway::{CallbackStatus, PaymentCallback, PaymentGateway};
use cinema_booking_core::publisher::EventPublisher;
use cinema_booking_core::store::BookingRepository;
use cinema_booking_core::{Booking, BookingEvent, BookingId, BookingStatus, CancellationReason};

/// What a payment callback did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Payment captured; seats reserved
    Confirmed {
        /// Booking
        booking_id: BookingId,
    },
    /// Booking cancelled and its seats released
    Cancelled {
        /// Booking
        booking_id: BookingId,
        /// Why
        reason: CancellationReason,
    },
    /// The callback was already applied
    AlreadyProcessed {
        /// Booking
        booking_id: BookingId,
        /// Status left by the earlier delivery
        status: BookingStatus,
    },
    /// The booking is in a state the callback cannot affect
    Ignored {
        /// Booking
        booking_id: BookingId,
        /// Current status
        status: BookingStatus,
    },
}

impl CallbackOutcome {
    /// Booking the callback referred to
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::Confirmed { booking_id }
            | Self::Cancelled { booking_id, .. }
            | Self::AlreadyProcessed { booking_id, .. }
            | Self::Ignored { booking_id, .. } => *booking_id,
        }
    }

    /// Metric label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::Cancelled {
                reason: CancellationReason::SeatsLost,
                ..
            } => "seats_lost",
            Self::Cancelled { .. } => "cancelled",
            Self::AlreadyProcessed { .. } => "duplicate",
            Self::Ignored { .. } => "ignored",
        }
    }
}

struct Applied {
    outcome: CallbackOutcome,
    booking: Booking,
    released: usize,
}

impl<R, C, G, P, K> BookingService<R, C, G, P, K>
where
    R: BookingRepository,
    C: ShowtimeCatalog,
    G: PaymentGateway,
    P: EventPublisher,
    K: Clock,
{
    /// Apply a raw gateway callback.
    ///
    /// | callback | booking status       | effect                                       |
    /// |----------|----------------------|----------------------------------------------|
    /// | paid     | `PAYMENT_PROCESSING` | confirm and reserve, or cancel if seats lost |
    /// | failed   | `PAYMENT_PROCESSING` | cancel and release seats                     |
    /// | expired  | `PAYMENT_PROCESSING` | cancel and release seats                     |
    /// | paid     | confirmed/checked in | already processed                            |
    /// | failed / expired | cancelled/expired | already processed                      |
    /// | anything else    |                   | ignored                                |
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::Gateway`] if the payload does not parse
    /// - [`BookingServiceError::PaymentReferenceNotFound`] if no booking owns the reference
    /// - [`BookingServiceError::InventoryMissing`] / [`BookingServiceError::Store`] on
    ///   persistence failure
    #[tracing::instrument(skip_all)]
    pub async fn handle_payment_callback(
        &self,
        payload: &[u8],
    ) -> Result<CallbackOutcome, BookingServiceError> {
        let callback = self
            .gateway
            .parse_callback(payload)
            .inspect_err(|e| tracing::warn!(error = %e, "Rejected payment callback"))?;
        tracing::debug!(
            reference_id = %callback.reference_id,
            status = callback.status.as_str(),
            "Payment callback received"
        );

        let applied = retry_with_predicate(
            &self.config.conflict_retry,
            "payment_callback",
            || self.try_apply_callback(&callback),
            retry_on_conflict("payment_callback"),
        )
        .await?;

        metrics::record_payment(applied.outcome.as_str());
        let booking = &applied.booking;
        let booking_id = booking.id();

        match &applied.outcome {
            CallbackOutcome::Confirmed { .. } => {
                let confirmed_at = booking.confirmed_at().unwrap_or_else(|| self.clock.now());
                tracing::info!(
                    %booking_id,
                    reference_id = %callback.reference_id,
                    "Booking confirmed"
                );
                metrics::record_booking("confirmed");
                publish_committed(
                    &self.publisher,
                    BookingEvent::BookingConfirmed {
                        booking_id,
                        customer_id: booking.customer_id(),
                        showtime_id: booking.showtime_id(),
                        seats: booking.seat_numbers(),
                        reference_id: callback.reference_id.clone(),
                        paid_at: callback.paid_at.unwrap_or(confirmed_at),
                        occurred_at: confirmed_at,
                    },
                )
                .await;
            }
            CallbackOutcome::Cancelled { reason, .. } => {
                if *reason == CancellationReason::SeatsLost {
                    tracing::warn!(
                        %booking_id,
                        reference_id = %callback.reference_id,
                        "Payment captured after seats were lost; refund required"
                    );
                } else {
                    tracing::info!(
                        %booking_id,
                        reason = reason.as_str(),
                        "Booking cancelled by payment callback"
                    );
                }
                metrics::record_booking("cancelled");
                metrics::record_seats_released("payment_callback", applied.released);
                publish_committed(
                    &self.publisher,
                    BookingEvent::BookingCancelled {
                        booking_id,
                        showtime_id: booking.showtime_id(),
                        seats: booking.seat_numbers(),
                        reason: *reason,
                        occurred_at: booking.cancelled_at().unwrap_or_else(|| self.clock.now()),
                    },
                )
                .await;
            }
            CallbackOutcome::AlreadyProcessed { status, .. } => {
                tracing::debug!(%booking_id, %status, "Duplicate payment callback");
            }
            CallbackOutcome::Ignored { status, .. } => {
                if callback.status == CallbackStatus::Paid {
                    tracing::warn!(
                        %booking_id,
                        %status,
                        "Payment captured for a closed booking; refund required"
                    );
                } else {
                    tracing::info!(
                        %booking_id,
                        %status,
                        callback = callback.status.as_str(),
                        "Payment callback ignored"
                    );
                }
            }
        }

        Ok(applied.outcome)
    }

    async fn try_apply_callback(
        &self,
        callback: &PaymentCallback,
    ) -> Result<Applied, BookingServiceError> {
        let now = self.clock.now();
        let mut booking = self
            .repository
            .booking_by_payment_reference(&callback.reference_id)
            .await?
            .ok_or_else(|| {
                BookingServiceError::PaymentReferenceNotFound(callback.reference_id.clone())
            })?;
        let booking_id = booking.id();
        let status = booking.status();

        let (reason, loaded) = match (callback.status, status) {
            (CallbackStatus::Paid, BookingStatus::PaymentProcessing) => {
                let mut inventory = self.load_inventory(booking.showtime_id()).await?;
                let seats = booking.seat_numbers();
                if inventory.is_held_by(&seats, booking_id) {
                    booking.confirm_payment(
                        callback.method.clone(),
                        callback.paid_at.unwrap_or(now),
                        now,
                    )?;
                    inventory.reserve_seats(&seats, booking_id)?;
                    self.repository.save_all(&mut inventory, &mut booking).await?;
                    return Ok(Applied {
                        outcome: CallbackOutcome::Confirmed { booking_id },
                        booking,
                        released: 0,
                    });
                }
                (CancellationReason::SeatsLost, Some(inventory))
            }
            (CallbackStatus::Failed, BookingStatus::PaymentProcessing) => {
                (CancellationReason::PaymentFailed, None)
            }
            (CallbackStatus::Expired, BookingStatus::PaymentProcessing) => {
                (CancellationReason::PaymentExpired, None)
            }
            (CallbackStatus::Paid, BookingStatus::Confirmed | BookingStatus::CheckedIn)
            | (
                CallbackStatus::Failed | CallbackStatus::Expired,
                BookingStatus::Cancelled | BookingStatus::Expired,
            ) => {
                return Ok(Applied {
                    outcome: CallbackOutcome::AlreadyProcessed { booking_id, status },
                    booking,
                    released: 0,
                });
            }
            _ => {
                return Ok(Applied {
                    outcome: CallbackOutcome::Ignored { booking_id, status },
                    booking,
                    released: 0,
                });
            }
        };

        let mut inventory = match loaded {
            Some(inventory) => inventory,
            None => self.load_inventory(booking.showtime_id()).await?,
        };
        booking.cancel(now)?;
        let released = inventory.release_seats(&booking.seat_numbers(), booking_id);
        self.repository.save_all(&mut inventory, &mut booking).await?;
        Ok(Applied {
            outcome: CallbackOutcome::Cancelled { booking_id, reason },
            booking,
            released,
        })
    }
}
