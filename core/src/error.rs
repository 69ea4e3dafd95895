//! Domain error taxonomy.
//!
//! Every invariant violation raised by [`Seat`](crate::seat::Seat),
//! [`SeatInventory`](crate::inventory::SeatInventory),
//! [`BookingTicket`](crate::ticket::BookingTicket) and
//! [`Booking`](crate::booking::Booking) is a [`DomainError`]. A method that
//! returns one has not mutated its receiver.

use crate::booking::BookingStatus;
use crate::seat::SeatStatus;
use crate::ticket::TicketStatus;
use crate::types::{BookingId, Currency, SeatNumber, TicketId};
use thiserror::Error;

/// Errors raised by the seat inventory and booking aggregates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    // ----- seat level -----
    /// Seat is unknown, already held or reserved, or named twice in one request
    #[error("Seat {seat} is not available")]
    SeatNotAvailable {
        /// First offending seat
        seat: SeatNumber,
    },

    /// Seat state machine does not allow this edge
    #[error("Seat {seat} cannot move from {from} to {to}")]
    InvalidSeatTransition {
        /// Seat number
        seat: SeatNumber,
        /// Current status
        from: SeatStatus,
        /// Requested status
        to: SeatStatus,
    },

    /// Seat is not held by the booking trying to reserve it
    #[error("Seat {seat} is not held by booking {booking_id}")]
    SeatNotHeldByBooking {
        /// Seat number
        seat: SeatNumber,
        /// Booking that attempted the reservation
        booking_id: BookingId,
    },

    /// A seat inventory needs at least one seat
    #[error("Seat inventory must contain at least one seat")]
    EmptyInventory,

    // ----- ticket level -----
    /// Ticket is not in a status that allows the action
    #[error("Ticket {ticket_id} cannot be {action} while {status}")]
    TicketInvalidStatus {
        /// Ticket id
        ticket_id: TicketId,
        /// Current status
        status: TicketStatus,
        /// Attempted action (`"issued"`, `"used"`, `"cancelled"`)
        action: &'static str,
    },

    /// Ticket was already scanned
    #[error("Ticket {ticket_id} has already been used")]
    TicketAlreadyUsed {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// No ticket for this seat in the booking
    #[error("No ticket for seat {seat} in this booking")]
    TicketNotFound {
        /// Seat number
        seat: SeatNumber,
    },

    /// An unissued ticket has no QR artifact to issue with
    #[error("Missing QR artifact for seat {seat}")]
    TicketArtifactMissing {
        /// Seat number
        seat: SeatNumber,
    },

    // ----- booking level -----
    /// A booking needs at least one ticket
    #[error("Booking must contain at least one seat")]
    BookingMinimumSeats,

    /// Booking state machine does not allow this edge
    #[error("Booking cannot move from {from} to {to}")]
    InvalidBookingTransition {
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
    },

    /// Booking is checked in, cancelled or expired
    #[error("Booking is already {status}")]
    BookingAlreadyTerminal {
        /// Terminal status
        status: BookingStatus,
    },

    /// Only bookings awaiting payment can expire
    #[error("Booking in status {status} cannot expire")]
    BookingCannotExpire {
        /// Current status
        status: BookingStatus,
    },

    /// Payment must be initiated before it can be confirmed
    #[error("Payment has not been initiated for this booking")]
    PaymentNotInitiated,

    /// Tickets are only generated for confirmed bookings
    #[error("Tickets cannot be generated while booking is {status}")]
    TicketGenerationNotAllowed {
        /// Current status
        status: BookingStatus,
    },

    /// Invoice is already attached
    #[error("Invoice has already been generated for this booking")]
    TicketAlreadyGenerated,

    /// Operation requires a confirmed booking
    #[error("Booking is {status}, expected CONFIRMED")]
    BookingNotConfirmed {
        /// Current status
        status: BookingStatus,
    },

    // ----- money -----
    /// Amounts in different currencies were combined
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency of the left operand
        expected: Currency,
        /// Currency of the right operand
        found: Currency,
    },

    /// Amount exceeded the representable range
    #[error("Amount overflow")]
    AmountOverflow,
}
