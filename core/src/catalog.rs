//! Showtime catalog port.

use crate::types::{Money, ScreenId, SeatNumber, ShowtimeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seating plan and price of one showtime
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowtimeSeating {
    /// Showtime
    pub showtime_id: ShowtimeId,
    /// Screen it plays on
    pub screen_id: ScreenId,
    /// Every seat on the screen
    pub seat_numbers: Vec<SeatNumber>,
    /// Price of one ticket
    pub ticket_price: Money,
    /// Screening start; booking closes at this time
    pub starts_at: DateTime<Utc>,
}

/// Errors from the catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Catalog backend unavailable
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the showtime catalog
pub trait ShowtimeCatalog: Send + Sync {
    /// Seating for a showtime, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] if the catalog cannot be reached.
    fn seating(
        &self,
        showtime_id: ShowtimeId,
    ) -> impl std::future::Future<Output = Result<Option<ShowtimeSeating>, CatalogError>> + Send;
}
