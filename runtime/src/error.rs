//! Errors returned by the booking runtime.

use chrono::{DateTime, Utc};
use cinema_booking_core::artifacts::ArtifactError;
use cinema_booking_core::catalog::CatalogError;
use cinema_booking_core::gateway::GatewayError;
use cinema_booking_core::store::StoreError;
use cinema_booking_core::{BookingId, BookingStatus, DomainError, SeatNumber, ShowtimeId};
use thiserror::Error;

/// Errors from booking use cases
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingServiceError {
    /// No booking with this id
    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),

    /// Catalog has no such showtime
    #[error("Showtime {0} not found")]
    ShowtimeNotFound(ShowtimeId),

    /// Showtime already started
    #[error("Showtime {showtime_id} started at {starts_at}; booking is closed")]
    ShowtimeClosed {
        /// Showtime
        showtime_id: ShowtimeId,
        /// Start time
        starts_at: DateTime<Utc>,
    },

    /// Caller does not own the booking
    #[error("Booking {0} belongs to another customer")]
    NotBookingOwner(BookingId),

    /// Seat hold lapsed before payment was initiated
    #[error("Hold for booking {booking_id} expired at {expired_at}")]
    HoldExpired {
        /// Booking
        booking_id: BookingId,
        /// Hold deadline
        expired_at: DateTime<Utc>,
    },

    /// Requested seats do not exist on the screen
    #[error("Unknown seats: {}", seat_list(.0))]
    UnknownSeats(Vec<SeatNumber>),

    /// Requested seats are held or reserved
    #[error("Seats not available: {}", seat_list(.0))]
    SeatsUnavailable(Vec<SeatNumber>),

    /// Same seat requested more than once
    #[error("Seats requested more than once: {}", seat_list(.0))]
    DuplicateSeats(Vec<SeatNumber>),

    /// Request exceeds the per-booking limit
    #[error("Requested {requested} seats; at most {max} per booking")]
    TooManySeats {
        /// Seats requested
        requested: usize,
        /// Configured limit
        max: usize,
    },

    /// Only bookings awaiting payment can be cancelled by the customer
    #[error("Booking {booking_id} cannot be cancelled while {status}")]
    NotCancellable {
        /// Booking
        booking_id: BookingId,
        /// Current status
        status: BookingStatus,
    },

    /// Booking exists but its showtime has no inventory
    #[error("No seat inventory for showtime {0}")]
    InventoryMissing(ShowtimeId),

    /// Callback names a reference no booking owns
    #[error("No booking for payment reference {0}")]
    PaymentReferenceNotFound(String),

    /// Domain invariant violation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Payment gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Showtime catalog failure
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Ticket artifact failure
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl BookingServiceError {
    /// Checks if the error is an optimistic-concurrency conflict
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::ConcurrencyConflict { .. }))
    }

    /// Checks if the caller may retry the same request later.
    ///
    /// Conflicts and infrastructure outages are retryable; validation and
    /// domain failures are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(StoreError::ConcurrencyConflict { .. } | StoreError::Database(_))
            | Self::Catalog(CatalogError::Unavailable(_)) => true,
            Self::Gateway(e) => e.is_transient(),
            Self::Artifact(e) => e.is_transient(),
            _ => false,
        }
    }
}

fn seat_list(seats: &[SeatNumber]) -> String {
    seats.iter().map(SeatNumber::as_str).collect::<Vec<_>>().join(", ")
}
