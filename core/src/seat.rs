//! Per-seat state inside a showtime's inventory.

use crate::error::DomainError;
use crate::types::{BookingId, SeatNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seat status as seen by callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// Free to be held
    Available,
    /// Temporarily held by a booking awaiting payment
    Held,
    /// Sold to a booking
    Reserved,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "AVAILABLE",
            Self::Held => "HELD",
            Self::Reserved => "RESERVED",
        };
        f.write_str(s)
    }
}

/// Seat state with its holder data.
///
/// Holder and deadline only exist on `Held`, so a seat can never carry a
/// stale hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    /// Free to be held
    Available,
    /// Held until `held_until` for `held_by`
    Held {
        /// Booking holding the seat
        held_by: BookingId,
        /// Hold deadline
        held_until: DateTime<Utc>,
    },
    /// Sold to `reserved_by`
    Reserved {
        /// Booking the seat was sold to
        reserved_by: BookingId,
    },
}

/// One seat of a [`SeatInventory`](crate::inventory::SeatInventory)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    number: SeatNumber,
    state: SeatState,
}

impl Seat {
    /// Creates an available seat
    #[must_use]
    pub const fn new(number: SeatNumber) -> Self {
        Self {
            number,
            state: SeatState::Available,
        }
    }

    /// Seat number
    #[must_use]
    pub const fn number(&self) -> &SeatNumber {
        &self.number
    }

    /// Full state including holder data
    #[must_use]
    pub const fn state(&self) -> &SeatState {
        &self.state
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> SeatStatus {
        match self.state {
            SeatState::Available => SeatStatus::Available,
            SeatState::Held { .. } => SeatStatus::Held,
            SeatState::Reserved { .. } => SeatStatus::Reserved,
        }
    }

    /// Booking holding the seat, if held
    #[must_use]
    pub const fn held_by(&self) -> Option<BookingId> {
        match self.state {
            SeatState::Held { held_by, .. } => Some(held_by),
            _ => None,
        }
    }

    /// Hold deadline, if held
    #[must_use]
    pub const fn held_until(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SeatState::Held { held_until, .. } => Some(held_until),
            _ => None,
        }
    }

    /// Booking the seat was sold to, if reserved
    #[must_use]
    pub const fn reserved_by(&self) -> Option<BookingId> {
        match self.state {
            SeatState::Reserved { reserved_by } => Some(reserved_by),
            _ => None,
        }
    }

    /// Checks if the seat is available
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.state, SeatState::Available)
    }

    /// Checks if the seat is held or reserved by `booking_id`
    #[must_use]
    pub fn is_claimed_by(&self, booking_id: BookingId) -> bool {
        match self.state {
            SeatState::Held { held_by, .. } => held_by == booking_id,
            SeatState::Reserved { reserved_by } => reserved_by == booking_id,
            SeatState::Available => false,
        }
    }

    /// Checks if the hold has lapsed.
    ///
    /// A hold is still valid at exactly `held_until`.
    #[must_use]
    pub fn is_held_expired(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            SeatState::Held { held_until, .. } => now > held_until,
            _ => false,
        }
    }

    /// Holds the seat for a booking.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::SeatNotAvailable`] unless the seat is available.
    pub fn hold(
        &mut self,
        booking_id: BookingId,
        held_until: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.is_available() {
            return Err(DomainError::SeatNotAvailable {
                seat: self.number.clone(),
            });
        }
        self.state = SeatState::Held {
            held_by: booking_id,
            held_until,
        };
        Ok(())
    }

    /// Converts a hold into a reservation, clearing the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidSeatTransition`] unless the seat is held.
    pub fn reserve(&mut self) -> Result<(), DomainError> {
        match self.state {
            SeatState::Held { held_by, .. } => {
                self.state = SeatState::Reserved { reserved_by: held_by };
                Ok(())
            }
            _ => Err(self.invalid_transition(SeatStatus::Reserved)),
        }
    }

    /// Returns a held or reserved seat to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidSeatTransition`] if the seat is already available.
    pub fn release(&mut self) -> Result<(), DomainError> {
        if self.is_available() {
            return Err(self.invalid_transition(SeatStatus::Available));
        }
        self.state = SeatState::Available;
        Ok(())
    }

    fn invalid_transition(&self, to: SeatStatus) -> DomainError {
        DomainError::InvalidSeatTransition {
            seat: self.number.clone(),
            from: self.status(),
            to,
        }
    }
}
