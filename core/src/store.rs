//! Persistence ports for the two aggregates.
//!
//! Every save is a conditional write guarded by the aggregate's [`Version`]:
//!
//! - version `0` inserts, failing if the aggregate already exists
//! - version `n` updates only if the stored version is still `n`
//!
//! On success the store bumps the in-memory version. A mismatch surfaces as
//! [`StoreError::ConcurrencyConflict`] and the caller reloads and retries.

use crate::booking::Booking;
use crate::inventory::SeatInventory;
use crate::types::{BookingId, ShowtimeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Optimistic-concurrency token
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Creates a new `Version`
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Version of an aggregate that was never persisted
    #[must_use]
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Returns the inner value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Checks if the aggregate was never persisted
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        self.0 == 0
    }

    /// Next version
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Aggregate changed since it was loaded
    #[error("Concurrency conflict on {aggregate} {id}: expected version {expected}")]
    ConcurrencyConflict {
        /// Aggregate kind (`"booking"`, `"seat_inventory"`)
        aggregate: &'static str,
        /// Aggregate id
        id: String,
        /// Version the writer loaded
        expected: Version,
    },

    /// Backend failure
    #[error("Database error: {0}")]
    Database(String),

    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Checks if the error is an optimistic-concurrency conflict
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Seat inventory persistence
pub trait SeatInventoryStore: Send + Sync {
    /// Load the inventory of a showtime, if one was created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn inventory_by_showtime(
        &self,
        showtime_id: ShowtimeId,
    ) -> impl std::future::Future<Output = Result<Option<SeatInventory>, StoreError>> + Send;

    /// Insert or conditionally update an inventory, bumping its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] if the stored version moved.
    fn save_inventory(
        &self,
        inventory: &mut SeatInventory,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// Booking persistence
pub trait BookingStore: Send + Sync {
    /// Load a booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn booking_by_id(
        &self,
        booking_id: BookingId,
    ) -> impl std::future::Future<Output = Result<Option<Booking>, StoreError>> + Send;

    /// Load the booking that owns a gateway payment reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn booking_by_payment_reference(
        &self,
        reference_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Booking>, StoreError>> + Send;

    /// `PENDING_PAYMENT` bookings whose hold deadline is strictly before
    /// `before`, oldest deadline first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn pending_expired_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Booking>, StoreError>> + Send;

    /// `PAYMENT_PROCESSING` bookings whose hold deadline is strictly before
    /// `before`, oldest deadline first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn processing_expired_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Booking>, StoreError>> + Send;

    /// `CONFIRMED` bookings without tickets issued or invoice attached,
    /// oldest confirmation first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn awaiting_fulfillment(
        &self,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Booking>, StoreError>> + Send;

    /// Insert or conditionally update a booking, bumping its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] if the stored version moved.
    fn save_booking(
        &self,
        booking: &mut Booking,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// Both stores plus an atomic write spanning the two aggregates
pub trait BookingRepository: SeatInventoryStore + BookingStore {
    /// Save inventory and booking in one transaction.
    ///
    /// Either both versions advance or neither does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] if either aggregate moved.
    fn save_all(
        &self,
        inventory: &mut SeatInventory,
        booking: &mut Booking,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_progression() {
        let v = Version::initial();
        assert!(v.is_initial());
        assert_eq!(v.next(), Version::new(1));
        assert_eq!(v.next().next().value(), 2);
    }

    #[test]
    fn test_conflict_classification() {
        let conflict = StoreError::ConcurrencyConflict {
            aggregate: "booking",
            id: "b1".to_string(),
            expected: Version::new(3),
        };
        assert!(conflict.is_conflict());
        assert!(!StoreError::Database("down".to_string()).is_conflict());
    }
}
