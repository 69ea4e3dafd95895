//! Seat inventory aggregate: every seat of one showtime.
//!
//! The inventory is the single serialization point for seat contention. Batch
//! operations validate every requested seat before touching any of them, so a
//! failed call leaves the inventory exactly as it was.

use crate::error::DomainError;
use crate::seat::{Seat, SeatStatus};
use crate::store::Version;
use crate::types::{BookingId, InventoryId, ScreenId, SeatNumber, ShowtimeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Result of [`SeatInventory::release_expired_holds`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpiredHolds {
    /// Distinct bookings that lost at least one seat
    pub bookings: BTreeSet<BookingId>,
    /// Seats returned to the pool
    pub released_seats: Vec<SeatNumber>,
}

impl ExpiredHolds {
    /// Checks if nothing was released
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.released_seats.is_empty()
    }
}

/// All seats of one showtime
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatInventory {
    id: InventoryId,
    screen_id: ScreenId,
    showtime_id: ShowtimeId,
    seats: BTreeMap<SeatNumber, Seat>,
    #[serde(skip)]
    version: Version,
}

impl SeatInventory {
    /// Creates an inventory with every seat available.
    ///
    /// Duplicate seat numbers collapse into one seat.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::EmptyInventory`] if `seat_numbers` is empty.
    pub fn create(
        screen_id: ScreenId,
        showtime_id: ShowtimeId,
        seat_numbers: impl IntoIterator<Item = SeatNumber>,
    ) -> Result<Self, DomainError> {
        let seats: BTreeMap<_, _> = seat_numbers
            .into_iter()
            .map(|number| (number.clone(), Seat::new(number)))
            .collect();

        if seats.is_empty() {
            return Err(DomainError::EmptyInventory);
        }

        Ok(Self {
            id: InventoryId::new(),
            screen_id,
            showtime_id,
            seats,
            version: Version::initial(),
        })
    }

    /// Inventory id
    #[must_use]
    pub const fn id(&self) -> InventoryId {
        self.id
    }

    /// Screen the showtime plays on
    #[must_use]
    pub const fn screen_id(&self) -> ScreenId {
        self.screen_id
    }

    /// Showtime this inventory belongs to
    #[must_use]
    pub const fn showtime_id(&self) -> ShowtimeId {
        self.showtime_id
    }

    /// Version loaded from the store (`0` if never persisted)
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Sets the version after a load or a successful save.
    ///
    /// Only store implementations should call this.
    pub const fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Holds every seat for `booking_id` until `hold_until`, or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::SeatNotAvailable`] naming the first seat that is
    /// unknown, not available, or requested twice.
    pub fn hold_seats(
        &mut self,
        seat_numbers: &[SeatNumber],
        booking_id: BookingId,
        hold_until: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut seen = BTreeSet::new();
        for number in seat_numbers {
            let available = self.seats.get(number).is_some_and(Seat::is_available);
            if !available || !seen.insert(number) {
                return Err(DomainError::SeatNotAvailable {
                    seat: number.clone(),
                });
            }
        }

        for number in seat_numbers {
            if let Some(seat) = self.seats.get_mut(number) {
                seat.hold(booking_id, hold_until)?;
            }
        }
        Ok(())
    }

    /// Converts this booking's holds into reservations, or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::SeatNotHeldByBooking`] for the first seat that is
    /// not currently held by `booking_id`.
    pub fn reserve_seats(
        &mut self,
        seat_numbers: &[SeatNumber],
        booking_id: BookingId,
    ) -> Result<(), DomainError> {
        let requested: BTreeSet<&SeatNumber> = seat_numbers.iter().collect();
        for number in &requested {
            let held = self
                .seats
                .get(*number)
                .is_some_and(|seat| seat.held_by() == Some(booking_id));
            if !held {
                return Err(DomainError::SeatNotHeldByBooking {
                    seat: (*number).clone(),
                    booking_id,
                });
            }
        }

        for number in requested {
            if let Some(seat) = self.seats.get_mut(number) {
                seat.reserve()?;
            }
        }
        Ok(())
    }

    /// Releases whatever this booking still holds or has reserved.
    ///
    /// Unknown seats and seats claimed by another booking are skipped, so the
    /// call is idempotent. Returns the number of seats released.
    pub fn release_seats(&mut self, seat_numbers: &[SeatNumber], booking_id: BookingId) -> usize {
        let mut released = 0;
        for number in seat_numbers {
            if let Some(seat) = self.seats.get_mut(number) {
                if seat.is_claimed_by(booking_id) && seat.release().is_ok() {
                    released += 1;
                }
            }
        }
        released
    }

    /// Releases every hold whose deadline is strictly before `now`.
    pub fn release_expired_holds(&mut self, now: DateTime<Utc>) -> ExpiredHolds {
        let mut expired = ExpiredHolds::default();
        for seat in self.seats.values_mut() {
            if !seat.is_held_expired(now) {
                continue;
            }
            let holder = seat.held_by();
            if seat.release().is_ok() {
                expired.bookings.extend(holder);
                expired.released_seats.push(seat.number().clone());
            }
        }
        expired
    }

    // ----- read-only views -----

    /// Looks up one seat
    #[must_use]
    pub fn seat(&self, number: &SeatNumber) -> Option<&Seat> {
        self.seats.get(number)
    }

    /// Iterates seats in seat-number order
    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }

    /// Number of seats
    #[must_use]
    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// Seats currently available
    #[must_use]
    pub fn available_seats(&self) -> Vec<SeatNumber> {
        self.seats_with_status(SeatStatus::Available)
    }

    /// Seats currently held
    #[must_use]
    pub fn held_seats(&self) -> Vec<SeatNumber> {
        self.seats_with_status(SeatStatus::Held)
    }

    /// Seats currently reserved
    #[must_use]
    pub fn reserved_seats(&self) -> Vec<SeatNumber> {
        self.seats_with_status(SeatStatus::Reserved)
    }

    /// Requested seats that do not exist on this screen
    #[must_use]
    pub fn unknown_seats(&self, seat_numbers: &[SeatNumber]) -> Vec<SeatNumber> {
        seat_numbers
            .iter()
            .filter(|number| !self.seats.contains_key(*number))
            .cloned()
            .collect()
    }

    /// Requested seats that exist but are held or reserved
    #[must_use]
    pub fn unavailable_seats(&self, seat_numbers: &[SeatNumber]) -> Vec<SeatNumber> {
        seat_numbers
            .iter()
            .filter(|number| self.seats.get(*number).is_some_and(|seat| !seat.is_available()))
            .cloned()
            .collect()
    }

    /// Checks that every seat is currently held by `booking_id`
    #[must_use]
    pub fn is_held_by(&self, seat_numbers: &[SeatNumber], booking_id: BookingId) -> bool {
        seat_numbers
            .iter()
            .all(|number| {
                self.seats
                    .get(number)
                    .is_some_and(|seat| seat.held_by() == Some(booking_id))
            })
    }

    fn seats_with_status(&self, status: SeatStatus) -> Vec<SeatNumber> {
        self.seats
            .values()
            .filter(|seat| seat.status() == status)
            .map(|seat| seat.number().clone())
            .collect()
    }
}
