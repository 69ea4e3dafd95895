//! In-memory booking repository with optimistic versioning.

use chrono::{DateTime, Utc};
use cinema_booking_core::store::{
    BookingRepository, BookingStore, SeatInventoryStore, StoreError, Version,
};
use cinema_booking_core::{Booking, BookingId, BookingStatus, SeatInventory, ShowtimeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    inventories: HashMap<ShowtimeId, SeatInventory>,
    bookings: HashMap<BookingId, Booking>,
    injected_conflicts: usize,
    injected_failure: Option<StoreError>,
    save_calls: usize,
}

impl State {
    fn check_inventory(&self, inventory: &SeatInventory) -> Result<(), StoreError> {
        let stored = self.inventories.get(&inventory.showtime_id()).map(SeatInventory::version);
        check_version(
            stored,
            inventory.version(),
            "seat_inventory",
            inventory.showtime_id().to_string(),
        )
    }

    fn check_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let stored = self.bookings.get(&booking.id()).map(Booking::version);
        check_version(stored, booking.version(), "booking", booking.id().to_string())
    }

    fn take_injected_fault(
        &mut self,
        aggregate: &'static str,
        id: String,
        expected: Version,
    ) -> Result<(), StoreError> {
        self.save_calls += 1;
        if let Some(error) = self.injected_failure.take() {
            return Err(error);
        }
        if self.injected_conflicts > 0 {
            self.injected_conflicts -= 1;
            return Err(StoreError::ConcurrencyConflict { aggregate, id, expected });
        }
        Ok(())
    }

    fn expired_with_status(
        &self,
        status: BookingStatus,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Vec<Booking> {
        let mut expired: Vec<Booking> = self
            .bookings
            .values()
            .filter(|b| b.status() == status && b.hold_expires_at() < before)
            .cloned()
            .collect();
        expired.sort_by_key(Booking::hold_expires_at);
        expired.truncate(limit);
        expired
    }
}

fn check_version(
    stored: Option<Version>,
    expected: Version,
    aggregate: &'static str,
    id: String,
) -> Result<(), StoreError> {
    match stored {
        None if expected.is_initial() => Ok(()),
        Some(current) if !expected.is_initial() && current == expected => Ok(()),
        _ => Err(StoreError::ConcurrencyConflict { aggregate, id, expected }),
    }
}

/// In-memory implementation of [`BookingRepository`].
///
/// Applies the same conditional-write rules as the Postgres repository:
/// version `0` inserts, anything else must match the stored version.
/// `save_all` checks both aggregates before writing either.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct InMemoryBookingRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryBookingRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` saves fail with a concurrency conflict.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn inject_conflicts(&self, count: usize) {
        self.state.lock().unwrap().injected_conflicts = count;
    }

    /// Make the next save fail with `error`.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn fail_next_save(&self, error: StoreError) {
        self.state.lock().unwrap().injected_failure = Some(error);
    }

    /// Number of save calls made so far (including failed ones).
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn save_calls(&self) -> usize {
        self.state.lock().unwrap().save_calls
    }

    /// Snapshot of the stored inventory for a showtime.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn inventory(&self, showtime_id: ShowtimeId) -> Option<SeatInventory> {
        self.state.lock().unwrap().inventories.get(&showtime_id).cloned()
    }

    /// Snapshot of a stored booking.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn booking(&self, booking_id: BookingId) -> Option<Booking> {
        self.state.lock().unwrap().bookings.get(&booking_id).cloned()
    }

    /// Every stored booking.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn bookings(&self) -> Vec<Booking> {
        self.state.lock().unwrap().bookings.values().cloned().collect()
    }

    /// Seed an aggregate pair directly, bypassing version checks.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn seed(&self, mut inventory: SeatInventory, bookings: impl IntoIterator<Item = Booking>) {
        let mut state = self.state.lock().unwrap();
        inventory.set_version(inventory.version().next());
        state.inventories.insert(inventory.showtime_id(), inventory);
        for mut booking in bookings {
            booking.set_version(booking.version().next());
            state.bookings.insert(booking.id(), booking);
        }
    }
}

impl SeatInventoryStore for InMemoryBookingRepository {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn inventory_by_showtime(
        &self,
        showtime_id: ShowtimeId,
    ) -> Result<Option<SeatInventory>, StoreError> {
        Ok(self.state.lock().unwrap().inventories.get(&showtime_id).cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn save_inventory(&self, inventory: &mut SeatInventory) -> Result<(), StoreError> {
        // Let concurrent tasks interleave between load and save
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.take_injected_fault(
            "seat_inventory",
            inventory.showtime_id().to_string(),
            inventory.version(),
        )?;
        state.check_inventory(inventory)?;

        inventory.set_version(inventory.version().next());
        state.inventories.insert(inventory.showtime_id(), inventory.clone());
        Ok(())
    }
}

impl BookingStore for InMemoryBookingRepository {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn booking_by_id(&self, booking_id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().unwrap().bookings.get(&booking_id).cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn booking_by_payment_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bookings
            .values()
            .find(|b| b.payment_reference() == Some(reference_id))
            .cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn pending_expired_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .expired_with_status(BookingStatus::PendingPayment, before, limit))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn processing_expired_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .expired_with_status(BookingStatus::PaymentProcessing, before, limit))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn awaiting_fulfillment(&self, limit: usize) -> Result<Vec<Booking>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut confirmed: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.status() == BookingStatus::Confirmed && !b.is_fulfilled())
            .cloned()
            .collect();
        confirmed.sort_by_key(Booking::confirmed_at);
        confirmed.truncate(limit);
        Ok(confirmed)
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn save_booking(&self, booking: &mut Booking) -> Result<(), StoreError> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.take_injected_fault("booking", booking.id().to_string(), booking.version())?;
        state.check_booking(booking)?;

        booking.set_version(booking.version().next());
        state.bookings.insert(booking.id(), booking.clone());
        Ok(())
    }
}

impl BookingRepository for InMemoryBookingRepository {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn save_all(
        &self,
        inventory: &mut SeatInventory,
        booking: &mut Booking,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.take_injected_fault("booking", booking.id().to_string(), booking.version())?;
        state.check_inventory(inventory)?;
        state.check_booking(booking)?;

        inventory.set_version(inventory.version().next());
        booking.set_version(booking.version().next());
        state.inventories.insert(inventory.showtime_id(), inventory.clone());
        state.bookings.insert(booking.id(), booking.clone());
        Ok(())
    }
}
