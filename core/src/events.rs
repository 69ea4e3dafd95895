//! Domain events published after a successful commit.
//!
//! Consumers (notifications, fulfillment, analytics) receive at-least-once
//! delivery and must treat every event as idempotent.

use crate::types::{ArtifactRef, BookingId, CustomerId, Money, SeatNumber, ShowtimeId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a booking was cancelled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// Customer cancelled before paying
    CustomerRequested,
    /// Gateway reported a failed payment
    PaymentFailed,
    /// Gateway reported the payment request expired
    PaymentExpired,
    /// Payment succeeded after the seats had already been released
    SeatsLost,
    /// Payment was still processing when the seat hold lapsed
    HoldLapsed,
}

impl CancellationReason {
    /// Stable label for logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomerRequested => "customer_requested",
            Self::PaymentFailed => "payment_failed",
            Self::PaymentExpired => "payment_expired",
            Self::SeatsLost => "seats_lost",
            Self::HoldLapsed => "hold_lapsed",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking lifecycle events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BookingEvent {
    /// Seats held and booking created
    BookingCreated {
        /// Booking
        booking_id: BookingId,
        /// Owner
        customer_id: CustomerId,
        /// Showtime
        showtime_id: ShowtimeId,
        /// Held seats
        seats: Vec<SeatNumber>,
        /// Amount due
        total_amount: Money,
        /// Hold deadline
        hold_expires_at: DateTime<Utc>,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },

    /// Payment request created at the gateway
    PaymentInitiated {
        /// Booking
        booking_id: BookingId,
        /// Gateway reference
        reference_id: String,
        /// Checkout URL
        payment_url: String,
        /// Amount requested
        amount: Money,
        /// Payment request expiry
        expires_at: DateTime<Utc>,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },

    /// Payment captured and seats reserved
    BookingConfirmed {
        /// Booking
        booking_id: BookingId,
        /// Owner
        customer_id: CustomerId,
        /// Showtime
        showtime_id: ShowtimeId,
        /// Reserved seats
        seats: Vec<SeatNumber>,
        /// Gateway reference
        reference_id: String,
        /// When the payment was captured
        paid_at: DateTime<Utc>,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },

    /// Booking cancelled and seats released
    BookingCancelled {
        /// Booking
        booking_id: BookingId,
        /// Showtime
        showtime_id: ShowtimeId,
        /// Released seats
        seats: Vec<SeatNumber>,
        /// Cause
        reason: CancellationReason,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },

    /// Hold lapsed before payment started
    BookingExpired {
        /// Booking
        booking_id: BookingId,
        /// Showtime
        showtime_id: ShowtimeId,
        /// Released seats
        seats: Vec<SeatNumber>,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },

    /// Tickets issued and invoice attached
    TicketsGenerated {
        /// Booking
        booking_id: BookingId,
        /// Codes of every issued ticket
        ticket_codes: Vec<String>,
        /// Invoice artifact
        invoice_ref: ArtifactRef,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },

    /// One ticket scanned
    TicketCheckedIn {
        /// Booking
        booking_id: BookingId,
        /// Ticket
        ticket_id: TicketId,
        /// Seat
        seat: SeatNumber,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },

    /// Every ticket of the booking scanned
    BookingCheckedIn {
        /// Booking
        booking_id: BookingId,
        /// When it happened
        occurred_at: DateTime<Utc>,
    },
}

impl BookingEvent {
    /// Versioned event type name, e.g. `"BookingCreated.v1"`
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => "BookingCreated.v1",
            Self::PaymentInitiated { .. } => "PaymentInitiated.v1",
            Self::BookingConfirmed { .. } => "BookingConfirmed.v1",
            Self::BookingCancelled { .. } => "BookingCancelled.v1",
            Self::BookingExpired { .. } => "BookingExpired.v1",
            Self::TicketsGenerated { .. } => "TicketsGenerated.v1",
            Self::TicketCheckedIn { .. } => "TicketCheckedIn.v1",
            Self::BookingCheckedIn { .. } => "BookingCheckedIn.v1",
        }
    }

    /// Booking the event belongs to
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::BookingCreated { booking_id, .. }
            | Self::PaymentInitiated { booking_id, .. }
            | Self::BookingConfirmed { booking_id, .. }
            | Self::BookingCancelled { booking_id, .. }
            | Self::BookingExpired { booking_id, .. }
            | Self::TicketsGenerated { booking_id, .. }
            | Self::TicketCheckedIn { booking_id, .. }
            | Self::BookingCheckedIn { booking_id, .. } => *booking_id,
        }
    }

    /// When the event happened
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::BookingCreated { occurred_at, .. }
            | Self::PaymentInitiated { occurred_at, .. }
            | Self::BookingConfirmed { occurred_at, .. }
            | Self::BookingCancelled { occurred_at, .. }
            | Self::BookingExpired { occurred_at, .. }
            | Self::TicketsGenerated { occurred_at, .. }
            | Self::TicketCheckedIn { occurred_at, .. }
            | Self::BookingCheckedIn { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_is_versioned() {
        let event = BookingEvent::BookingExpired {
            booking_id: BookingId::new(),
            showtime_id: ShowtimeId::new(),
            seats: vec![SeatNumber::new("A1")],
            occurred_at: Utc::now(),
        };
        assert_eq!(event.event_type(), "BookingExpired.v1");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BookingExpired");
        assert_eq!(json["booking_id"], event.booking_id().to_string());
    }

    #[test]
    fn test_cancellation_reason_serializes_snake_case() {
        let json = serde_json::to_string(&CancellationReason::SeatsLost).unwrap();
        assert_eq!(json, "\"seats_lost\"");
    }
}
