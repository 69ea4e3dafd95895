//! In-memory showtime catalog.

use cinema_booking_core::ShowtimeId;
use cinema_booking_core::catalog::{CatalogError, ShowtimeCatalog, ShowtimeSeating};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Catalog backed by a map of showtimes.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct InMemoryShowtimeCatalog {
    showtimes: Arc<Mutex<HashMap<ShowtimeId, ShowtimeSeating>>>,
}

impl InMemoryShowtimeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with one showtime.
    #[must_use]
    pub fn with_showtime(seating: ShowtimeSeating) -> Self {
        let catalog = Self::new();
        catalog.add(seating);
        catalog
    }

    /// Add or replace a showtime.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn add(&self, seating: ShowtimeSeating) {
        self.showtimes.lock().unwrap().insert(seating.showtime_id, seating);
    }
}

impl ShowtimeCatalog for InMemoryShowtimeCatalog {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn seating(
        &self,
        showtime_id: ShowtimeId,
    ) -> Result<Option<ShowtimeSeating>, CatalogError> {
        Ok(self.showtimes.lock().unwrap().get(&showtime_id).cloned())
    }
}
