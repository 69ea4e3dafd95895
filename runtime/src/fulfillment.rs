//! Ticket fulfillment worker.
//!
//! Issues QR tickets and the invoice for confirmed bookings. Jobs arrive on
//! an `mpsc` queue fed by [`QueuePublisher`](crate::publisher::QueuePublisher)
//! and from a periodic poll of confirmed bookings that are still unfulfilled,
//! so a booking may be delivered more than once. Artifacts are rendered
//! outside the conflict loop and recorded with one conditional write; a
//! second delivery finds the booking fulfilled and does nothing.

use crate::error::BookingServiceError;
use crate::metrics;
use crate::publisher::publish_committed;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::service::retry_on_conflict;
use cinema_booking_core::artifacts::{ArtifactError, TicketArtifactGenerator, TicketArtifactRequest};
use cinema_booking_core::environment::Clock;
use cinema_booking_core::publisher::EventPublisher;
use cinema_booking_core::store::BookingRepository;
use cinema_booking_core::{
    ArtifactRef, Booking, BookingEvent, BookingId, BookingStatus, SeatNumber, TicketStatus,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

/// Worker settings
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentConfig {
    /// Time between polls for unfulfilled bookings
    pub poll_interval: Duration,
    /// Bookings fetched per poll
    pub batch_size: usize,
    /// Retries of transient artifact failures
    pub artifact_retry: RetryPolicy,
    /// Re-runs after version conflicts
    pub conflict_retry: RetryPolicy,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            batch_size: 50,
            artifact_retry: RetryPolicy::default(),
            conflict_retry: RetryPolicy::default(),
        }
    }
}

/// What one fulfillment attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Tickets issued and invoice attached
    Fulfilled {
        /// Tickets issued by this attempt
        tickets_issued: usize,
    },
    /// An earlier delivery already fulfilled the booking
    AlreadyFulfilled,
    /// The booking is not confirmed
    Skipped {
        /// Current status
        status: BookingStatus,
    },
    /// No booking with this id
    NotFound,
}

/// Background worker issuing tickets for confirmed bookings
pub struct FulfillmentWorker<R, A, P, K> {
    repository: R,
    artifacts: A,
    publisher: P,
    clock: K,
    config: FulfillmentConfig,
}

impl<R, A, P, K> FulfillmentWorker<R, A, P, K>
where
    R: BookingRepository,
    A: TicketArtifactGenerator,
    P: EventPublisher,
    K: Clock,
{
    /// Create a worker.
    #[must_use]
    pub const fn new(
        repository: R,
        artifacts: A,
        publisher: P,
        clock: K,
        config: FulfillmentConfig,
    ) -> Self {
        Self {
            repository,
            artifacts,
            publisher,
            clock,
            config,
        }
    }

    /// Fulfill one booking.
    ///
    /// # Errors
    ///
    /// - [`BookingServiceError::Artifact`] if rendering fails after retries
    /// - [`BookingServiceError::Store`] on persistence failure
    #[tracing::instrument(skip(self), fields(%booking_id))]
    pub async fn fulfill(
        &self,
        booking_id: BookingId,
    ) -> Result<FulfillmentOutcome, BookingServiceError> {
        let started = Instant::now();
        let Some(booking) = self.repository.booking_by_id(booking_id).await? else {
            tracing::warn!("Fulfillment requested for unknown booking");
            return Ok(FulfillmentOutcome::NotFound);
        };
        if let Some(outcome) = Self::precheck(&booking) {
            tracing::debug!(?outcome, "Nothing to fulfill");
            return Ok(outcome);
        }

        let qr_refs = self.render_tickets(&booking).await?;
        let invoice = match booking.invoice_ref() {
            Some(_) => None,
            None => Some(
                retry_with_predicate(
                    &self.config.artifact_retry,
                    "render_invoice",
                    || self.artifacts.render_invoice(&booking),
                    ArtifactError::is_transient,
                )
                .await?,
            ),
        };

        let (booking, tickets_issued) = match retry_with_predicate(
            &self.config.conflict_retry,
            "fulfill_booking",
            || self.try_record(booking_id, &qr_refs, invoice.as_ref()),
            retry_on_conflict("fulfill_booking"),
        )
        .await?
        {
            Recorded::Saved { booking, issued } => (booking, issued),
            Recorded::Unchanged(outcome) => return Ok(outcome),
        };

        let ticket_codes: Vec<String> = booking
            .tickets()
            .iter()
            .filter_map(|t| t.ticket_code().map(str::to_string))
            .collect();
        tracing::info!(tickets_issued, "Booking fulfilled");
        metrics::record_tickets_issued(tickets_issued);
        metrics::record_fulfillment_duration(started.elapsed().as_secs_f64());

        if let Some(invoice_ref) = booking.invoice_ref() {
            publish_committed(
                &self.publisher,
                BookingEvent::TicketsGenerated {
                    booking_id,
                    ticket_codes,
                    invoice_ref: invoice_ref.clone(),
                    occurred_at: self.clock.now(),
                },
            )
            .await;
        }

        Ok(FulfillmentOutcome::Fulfilled { tickets_issued })
    }

    /// Consume queued booking ids and poll for stragglers until `shutdown` fires.
    ///
    /// Failed bookings stay unfulfilled and are retried by the next poll.
    pub async fn run(
        &self,
        mut queue: mpsc::Receiver<BookingId>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut queue_open = true;
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Fulfillment worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Fulfillment worker stopping");
                    break;
                }
                job = queue.recv(), if queue_open => match job {
                    Some(booking_id) => self.fulfill_logged(booking_id).await,
                    None => {
                        tracing::warn!("Fulfillment queue closed; continuing with polling only");
                        queue_open = false;
                    }
                },
                _ = ticker.tick() => self.poll_once().await,
            }
        }
    }

    /// Fulfill every booking the store reports as awaiting fulfillment.
    pub async fn poll_once(&self) {
        match self.repository.awaiting_fulfillment(self.config.batch_size).await {
            Ok(bookings) => {
                if !bookings.is_empty() {
                    tracing::debug!(count = bookings.len(), "Polled unfulfilled bookings");
                }
                for booking in bookings {
                    self.fulfill_logged(booking.id()).await;
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to poll unfulfilled bookings"),
        }
    }

    async fn fulfill_logged(&self, booking_id: BookingId) {
        if let Err(e) = self.fulfill(booking_id).await {
            tracing::warn!(%booking_id, error = %e, "Fulfillment failed; will retry on next poll");
        }
    }

    fn precheck(booking: &Booking) -> Option<FulfillmentOutcome> {
        if booking.status() != BookingStatus::Confirmed {
            return Some(FulfillmentOutcome::Skipped {
                status: booking.status(),
            });
        }
        booking.is_fulfilled().then_some(FulfillmentOutcome::AlreadyFulfilled)
    }

    async fn render_tickets(
        &self,
        booking: &Booking,
    ) -> Result<HashMap<SeatNumber, ArtifactRef>, BookingServiceError> {
        let qr_seed = booking.qr_seed().unwrap_or_default().to_string();
        let mut qr_refs = HashMap::new();

        for ticket in booking.tickets().iter().filter(|t| t.status() == TicketStatus::Pending) {
            let request = TicketArtifactRequest {
                booking_id: booking.id(),
                seat: ticket.seat_number().clone(),
                ticket_code: booking.ticket_code_for(ticket.seat_number()),
                qr_seed: qr_seed.clone(),
            };
            let qr_ref = retry_with_predicate(
                &self.config.artifact_retry,
                "render_ticket",
                || self.artifacts.render_ticket(&request),
                ArtifactError::is_transient,
            )
            .await?;
            qr_refs.insert(request.seat, qr_ref);
        }
        Ok(qr_refs)
    }

    async fn try_record(
        &self,
        booking_id: BookingId,
        qr_refs: &HashMap<SeatNumber, ArtifactRef>,
        invoice: Option<&ArtifactRef>,
    ) -> Result<Recorded, BookingServiceError> {
        let Some(mut booking) = self.repository.booking_by_id(booking_id).await? else {
            return Ok(Recorded::Unchanged(FulfillmentOutcome::NotFound));
        };
        if let Some(outcome) = Self::precheck(&booking) {
            return Ok(Recorded::Unchanged(outcome));
        }

        let issued = booking.issue_tickets(qr_refs, self.clock.now())?;
        if booking.invoice_ref().is_none() {
            if let Some(invoice) = invoice {
                booking.attach_invoice(invoice.clone())?;
            }
        }
        self.repository.save_booking(&mut booking).await?;
        Ok(Recorded::Saved { booking, issued })
    }
}

enum Recorded {
    Saved { booking: Booking, issued: usize },
    Unchanged(FulfillmentOutcome),
}
