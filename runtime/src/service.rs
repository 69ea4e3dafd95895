//! Booking orchestration service.
//!
//! Coordinates the seat inventory and booking aggregates for the customer
//! and staff use cases. Every use case follows the same shape:
//!
//! 1. load the aggregates
//! 2. validate and mutate them with synchronous domain methods
//! 3. persist through one conditional write (`save_all` when both change)
//! 4. publish the resulting event
//!
//! Steps 1-3 re-run from fresh state when the write hits a version conflict.
//! Any failure before step 3 leaves the store untouched.

use crate::config::BookingConfig;
use crate::error::BookingServiceError;
use crate::metrics;
use crate::publisher::publish_committed;
use crate::retry::retry_with_predicate;
use chrono::{DateTime, Utc};
use cinema_booking_core::catalog::{ShowtimeCatalog, ShowtimeSeating};
use cinema_booking_core::environment::Clock;
use cinema_booking_core::gateway::{GatewayError, PaymentGateway, PaymentRequest, PaymentSession};
use cinema_booking_core::publisher::EventPublisher;
use cinema_booking_core::store::BookingRepository;
use cinema_booking_core::{
    Booking, BookingEvent, BookingId, BookingStatus, BookingTicket, CancellationReason, CustomerId,
    DomainError, SeatInventory, SeatNumber, ShowtimeId,
};
use std::collections::BTreeSet;

type Result<T> = std::result::Result<T, BookingServiceError>;

/// Retry predicate for conflict-retried steps; counts every conflict.
pub(crate) fn retry_on_conflict(operation: &'static str) -> impl Fn(&BookingServiceError) -> bool {
    move |err| {
        let conflict = err.is_conflict();
        if conflict {
            tracing::debug!(operation, "Version conflict; reloading");
            metrics::record_concurrency_conflict(operation);
        }
        conflict
    }
}

/// Customer request to book seats
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateBookingRequest {
    /// Customer making the booking
    pub customer_id: CustomerId,
    /// Showtime to book
    pub showtime_id: ShowtimeId,
    /// Seats, in the order tickets should appear
    pub seats: Vec<SeatNumber>,
}

/// Seat map of a showtime
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatAvailability {
    /// Showtime
    pub showtime_id: ShowtimeId,
    /// Free seats
    pub available: Vec<SeatNumber>,
    /// Seats held for unpaid bookings
    pub held: Vec<SeatNumber>,
    /// Sold seats
    pub reserved: Vec<SeatNumber>,
}

/// Booking orchestration service
///
/// Generic over its ports so tests run against in-memory adapters and
/// production against Postgres.
#[derive(Clone)]
pub struct BookingService<R, C, G, P, K> {
    pub(crate) repository: R,
    pub(crate) catalog: C,
    pub(crate) gateway: G,
    pub(crate) publisher: P,
    pub(crate) clock: K,
    pub(crate) config: BookingConfig,
}

impl<R, C, G, P, K> BookingService<R, C, G, P, K>
where
    R: BookingRepository,
    C: ShowtimeCatalog,
    G: PaymentGateway,
    P: EventPublisher,
    K: Clock,
{
    /// Create a new service.
    #[must_use]
    pub const fn new(
        repository: R,
        catalog: C,
        gateway: G,
        publisher: P,
        clock: K,
        config: BookingConfig,
    ) -> Self {
        Self {
            repository,
            catalog,
            gateway,
            publisher,
            clock,
            config,
        }
    }

    /// Service configuration
    #[must_use]
    pub const fn config(&self) -> &BookingConfig {
        &self.config
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Hold seats and create a booking awaiting payment.
    ///
    /// The inventory is created from the catalog on the first booking for a
    /// showtime. Seat holds and the booking share one deadline.
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::ShowtimeNotFound`] / [`BookingServiceError::ShowtimeClosed`]
    /// - [`BookingServiceError::DuplicateSeats`], [`BookingServiceError::TooManySeats`],
    ///   [`DomainError::BookingMinimumSeats`] for malformed requests
    /// - [`BookingServiceError::UnknownSeats`] / [`BookingServiceError::SeatsUnavailable`]
    /// - [`BookingServiceError::Store`] if persistence fails or conflicts persist
    #[tracing::instrument(
        skip(self, request),
        fields(
            showtime_id = %request.showtime_id,
            customer_id = %request.customer_id,
            seats = request.seats.len()
        )
    )]
    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        self.validate_seat_request(&request.seats)?;

        let seating = self
            .catalog
            .seating(request.showtime_id)
            .await?
            .ok_or(BookingServiceError::ShowtimeNotFound(request.showtime_id))?;
        if self.clock.now() >= seating.starts_at {
            return Err(BookingServiceError::ShowtimeClosed {
                showtime_id: seating.showtime_id,
                starts_at: seating.starts_at,
            });
        }

        let booking_id = BookingId::new();
        let result = retry_with_predicate(
            &self.config.conflict_retry,
            "create_booking",
            || self.try_create_booking(booking_id, &request, &seating),
            retry_on_conflict("create_booking"),
        )
        .await;

        let booking = match result {
            Ok(booking) => booking,
            Err(e) => {
                if matches!(e, BookingServiceError::SeatsUnavailable(_)) {
                    metrics::record_hold_conflict();
                }
                tracing::warn!(error = %e, "Booking rejected");
                return Err(e);
            }
        };

        tracing::info!(
            %booking_id,
            hold_expires_at = %booking.hold_expires_at(),
            total = %booking.total_amount(),
            "Booking created"
        );
        metrics::record_booking("created");

        publish_committed(
            &self.publisher,
            BookingEvent::BookingCreated {
                booking_id,
                customer_id: booking.customer_id(),
                showtime_id: booking.showtime_id(),
                seats: booking.seat_numbers(),
                total_amount: booking.total_amount(),
                hold_expires_at: booking.hold_expires_at(),
                occurred_at: booking.created_at(),
            },
        )
        .await;

        Ok(booking)
    }

    async fn try_create_booking(
        &self,
        booking_id: BookingId,
        request: &CreateBookingRequest,
        seating: &ShowtimeSeating,
    ) -> Result<Booking> {
        let now = self.clock.now();
        let stored = self.repository.inventory_by_showtime(request.showtime_id).await?;
        let mut inventory = match stored {
            Some(inventory) => inventory,
            None => SeatInventory::create(
                seating.screen_id,
                seating.showtime_id,
                seating.seat_numbers.iter().cloned(),
            )?,
        };

        let unknown = inventory.unknown_seats(&request.seats);
        if !unknown.is_empty() {
            return Err(BookingServiceError::UnknownSeats(unknown));
        }
        let unavailable = inventory.unavailable_seats(&request.seats);
        if !unavailable.is_empty() {
            return Err(BookingServiceError::SeatsUnavailable(unavailable));
        }

        let hold_until = now + self.config.hold_duration;
        inventory.hold_seats(&request.seats, booking_id, hold_until)?;

        let tickets = request
            .seats
            .iter()
            .map(|seat| BookingTicket::new(seat.clone(), seating.ticket_price))
            .collect();
        let mut booking = Booking::create(
            booking_id,
            request.customer_id,
            request.showtime_id,
            tickets,
            self.config.service_fee,
            now,
            hold_until,
        )?;

        self.repository.save_all(&mut inventory, &mut booking).await?;
        Ok(booking)
    }

    fn validate_seat_request(&self, seats: &[SeatNumber]) -> Result<()> {
        if seats.is_empty() {
            return Err(DomainError::BookingMinimumSeats.into());
        }

        let mut seen = BTreeSet::new();
        let duplicates: BTreeSet<SeatNumber> =
            seats.iter().filter(|s| !seen.insert(*s)).cloned().collect();
        if !duplicates.is_empty() {
            return Err(BookingServiceError::DuplicateSeats(duplicates.into_iter().collect()));
        }

        let max = self.config.max_seats_per_booking;
        if seats.len() > max {
            return Err(BookingServiceError::TooManySeats {
                requested: seats.len(),
                max,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Payment
    // ========================================================================

    /// Create a gateway payment request for a pending booking.
    ///
    /// The request expires with the seat hold. Transient gateway failures
    /// are retried with backoff.
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::BookingNotFound`] / [`BookingServiceError::NotBookingOwner`]
    /// - [`BookingServiceError::HoldExpired`] if the hold already lapsed
    /// - [`BookingServiceError::Domain`] unless the booking is `PENDING_PAYMENT`
    /// - [`BookingServiceError::Gateway`] if the gateway rejects or stays unavailable
    #[tracing::instrument(skip(self), fields(%booking_id))]
    pub async fn initiate_payment(
        &self,
        booking_id: BookingId,
        customer_id: CustomerId,
    ) -> Result<Booking> {
        let booking = self.load_owned(booking_id, customer_id).await?;
        self.ensure_payable(&booking, self.clock.now())?;

        let request = PaymentRequest {
            booking_id,
            customer_id,
            amount: booking.total_amount(),
            description: format!("Booking {} ({} seats)", booking_id, booking.tickets().len()),
            expires_at: booking.hold_expires_at(),
        };
        let session = retry_with_predicate(
            &self.config.gateway_retry,
            "create_payment_request",
            || self.gateway.create_payment_request(&request),
            GatewayError::is_transient,
        )
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Payment request failed"))?;

        let booking = retry_with_predicate(
            &self.config.conflict_retry,
            "initiate_payment",
            || self.try_initiate_payment(booking_id, &session),
            retry_on_conflict("initiate_payment"),
        )
        .await
        .inspect_err(|e| {
            tracing::warn!(
                %booking_id,
                reference_id = %session.reference_id,
                error = %e,
                "Payment request created but not recorded; gateway session orphaned"
            );
        })?;

        tracing::info!(reference_id = %session.reference_id, "Payment initiated");
        publish_committed(
            &self.publisher,
            BookingEvent::PaymentInitiated {
                booking_id,
                reference_id: session.reference_id,
                payment_url: session.payment_url,
                amount: booking.total_amount(),
                expires_at: session.expires_at,
                occurred_at: self.clock.now(),
            },
        )
        .await;

        Ok(booking)
    }

    async fn try_initiate_payment(
        &self,
        booking_id: BookingId,
        session: &PaymentSession,
    ) -> Result<Booking> {
        let mut booking = self.load(booking_id).await?;
        self.ensure_payable(&booking, self.clock.now())?;
        booking.initiate_payment(session.reference_id.clone(), session.payment_url.clone())?;
        self.repository.save_booking(&mut booking).await?;
        Ok(booking)
    }

    fn ensure_payable(&self, booking: &Booking, now: DateTime<Utc>) -> Result<()> {
        if booking.is_hold_expired(now) {
            return Err(BookingServiceError::HoldExpired {
                booking_id: booking.id(),
                expired_at: booking.hold_expires_at(),
            });
        }
        let status = booking.status();
        if status.is_terminal() {
            return Err(DomainError::BookingAlreadyTerminal { status }.into());
        }
        if status != BookingStatus::PendingPayment {
            return Err(DomainError::InvalidBookingTransition {
                from: status,
                to: BookingStatus::PaymentProcessing,
            }
            .into());
        }
        Ok(())
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    /// Cancel an unpaid booking on the customer's request and release its seats.
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::BookingNotFound`] / [`BookingServiceError::NotBookingOwner`]
    /// - [`BookingServiceError::NotCancellable`] unless `PENDING_PAYMENT`
    /// - [`BookingServiceError::InventoryMissing`] if the showtime has no inventory
    #[tracing::instrument(skip(self), fields(%booking_id))]
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        customer_id: CustomerId,
    ) -> Result<Booking> {
        let (booking, released) = retry_with_predicate(
            &self.config.conflict_retry,
            "cancel_booking",
            || self.try_cancel_booking(booking_id, customer_id),
            retry_on_conflict("cancel_booking"),
        )
        .await?;

        tracing::info!(released, "Booking cancelled by customer");
        metrics::record_booking("cancelled");
        metrics::record_seats_released("customer_cancel", released);

        publish_committed(
            &self.publisher,
            BookingEvent::BookingCancelled {
                booking_id,
                showtime_id: booking.showtime_id(),
                seats: booking.seat_numbers(),
                reason: CancellationReason::CustomerRequested,
                occurred_at: booking.cancelled_at().unwrap_or_else(|| self.clock.now()),
            },
        )
        .await;

        Ok(booking)
    }

    async fn try_cancel_booking(
        &self,
        booking_id: BookingId,
        customer_id: CustomerId,
    ) -> Result<(Booking, usize)> {
        let now = self.clock.now();
        let mut booking = self.load_owned(booking_id, customer_id).await?;
        if booking.status() != BookingStatus::PendingPayment {
            return Err(BookingServiceError::NotCancellable {
                booking_id,
                status: booking.status(),
            });
        }
        let mut inventory = self.load_inventory(booking.showtime_id()).await?;

        booking.cancel(now)?;
        let released = inventory.release_seats(&booking.seat_numbers(), booking_id);
        self.repository.save_all(&mut inventory, &mut booking).await?;
        Ok((booking, released))
    }

    // ========================================================================
    // Check-in
    // ========================================================================

    /// Check in every ticket of a confirmed booking.
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::BookingNotFound`]
    /// - [`BookingServiceError::Domain`] unless the booking is `CONFIRMED`
    #[tracing::instrument(skip(self), fields(%booking_id))]
    pub async fn check_in(&self, booking_id: BookingId) -> Result<Booking> {
        let booking = retry_with_predicate(
            &self.config.conflict_retry,
            "check_in",
            || async {
                let mut booking = self.load(booking_id).await?;
                booking.check_in(self.clock.now())?;
                self.repository.save_booking(&mut booking).await?;
                Ok::<_, BookingServiceError>(booking)
            },
            retry_on_conflict("check_in"),
        )
        .await?;

        tracing::info!("Booking checked in");
        metrics::record_booking("checked_in");
        publish_committed(
            &self.publisher,
            BookingEvent::BookingCheckedIn {
                booking_id,
                occurred_at: booking.checked_in_at().unwrap_or_else(|| self.clock.now()),
            },
        )
        .await;
        Ok(booking)
    }

    /// Check in one seat. The booking completes once every ticket is scanned.
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::BookingNotFound`]
    /// - [`BookingServiceError::Domain`] for unknown seats, used tickets, or
    ///   bookings that are not confirmed
    #[tracing::instrument(skip(self), fields(%booking_id, %seat))]
    pub async fn check_in_ticket(
        &self,
        booking_id: BookingId,
        seat: &SeatNumber,
    ) -> Result<Booking> {
        let (booking, ticket_id, completed) = retry_with_predicate(
            &self.config.conflict_retry,
            "check_in_ticket",
            || async {
                let mut booking = self.load(booking_id).await?;
                let was_checked_in = booking.status() == BookingStatus::CheckedIn;
                let ticket_id = booking.check_in_ticket(seat, self.clock.now())?;
                self.repository.save_booking(&mut booking).await?;
                let completed = !was_checked_in && booking.status() == BookingStatus::CheckedIn;
                Ok::<_, BookingServiceError>((booking, ticket_id, completed))
            },
            retry_on_conflict("check_in_ticket"),
        )
        .await?;

        let now = self.clock.now();
        tracing::info!(%ticket_id, completed, "Ticket checked in");
        publish_committed(
            &self.publisher,
            BookingEvent::TicketCheckedIn {
                booking_id,
                ticket_id,
                seat: seat.clone(),
                occurred_at: now,
            },
        )
        .await;
        if completed {
            metrics::record_booking("checked_in");
            publish_committed(
                &self.publisher,
                BookingEvent::BookingCheckedIn {
                    booking_id,
                    occurred_at: booking.checked_in_at().unwrap_or(now),
                },
            )
            .await;
        }
        Ok(booking)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch a booking for its owner.
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::BookingNotFound`] / [`BookingServiceError::NotBookingOwner`]
    pub async fn booking(&self, booking_id: BookingId, customer_id: CustomerId) -> Result<Booking> {
        self.load_owned(booking_id, customer_id).await
    }

    /// Seat map of a showtime.
    ///
    /// Showtimes nobody booked yet report every catalog seat as available.
    /// Lapsed holds stay held until the sweeper releases them.
    ///
    /// # Errors
    ///
    /// Returns [`BookingServiceError::ShowtimeNotFound`] if neither the store
    /// nor the catalog knows the showtime.
    pub async fn availability(&self, showtime_id: ShowtimeId) -> Result<SeatAvailability> {
        if let Some(inventory) = self.repository.inventory_by_showtime(showtime_id).await? {
            return Ok(SeatAvailability {
                showtime_id,
                available: inventory.available_seats(),
                held: inventory.held_seats(),
                reserved: inventory.reserved_seats(),
            });
        }

        let seating = self
            .catalog
            .seating(showtime_id)
            .await?
            .ok_or(BookingServiceError::ShowtimeNotFound(showtime_id))?;
        let available: BTreeSet<SeatNumber> = seating.seat_numbers.into_iter().collect();
        Ok(SeatAvailability {
            showtime_id,
            available: available.into_iter().collect(),
            held: Vec::new(),
            reserved: Vec::new(),
        })
    }

    // ========================================================================
    // Loading
    // ========================================================================

    pub(crate) async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        self.repository
            .booking_by_id(booking_id)
            .await?
            .ok_or(BookingServiceError::BookingNotFound(booking_id))
    }

    async fn load_owned(&self, booking_id: BookingId, customer_id: CustomerId) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.is_owned_by(customer_id) {
            tracing::warn!(%booking_id, %customer_id, "Booking accessed by non-owner");
            return Err(BookingServiceError::NotBookingOwner(booking_id));
        }
        Ok(booking)
    }

    pub(crate) async fn load_inventory(&self, showtime_id: ShowtimeId) -> Result<SeatInventory> {
        self.repository
            .inventory_by_showtime(showtime_id)
            .await?
            .ok_or(BookingServiceError::InventoryMissing(showtime_id))
    }
}
