//! PostgreSQL implementation of the booking repository.
//!
//! Each aggregate is stored as a JSONB document next to a `version` column.
//! Writes are conditional on that column:
//!
//! - version `0` is an `INSERT ... ON CONFLICT DO NOTHING`
//! - version `n` is an `UPDATE ... WHERE version = n`
//!
//! Zero affected rows means another writer got there first and the call
//! fails with [`StoreError::ConcurrencyConflict`]. [`BookingRepository::save_all`]
//! runs both writes in one transaction, so a conflict on either aggregate
//! rolls back the other.
//!
//! Columns the sweeper and fulfillment worker filter on (`status`,
//! `hold_expires_at`, `confirmed_at`, `fulfilled`, `payment_reference`) are
//! denormalized out of the booking document on every write.
//!
//! # Example
//!
//! ```no_run
//! use cinema_booking_postgres::PostgresBookingRepository;
//!
//! # async fn example() -> Result<(), cinema_booking_core::store::StoreError> {
//! let repository = PostgresBookingRepository::connect("postgres://localhost/cinema", 10).await?;
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use cinema_booking_core::booking::{Booking, BookingStatus};
use cinema_booking_core::inventory::SeatInventory;
use cinema_booking_core::store::{
    BookingRepository, BookingStore, SeatInventoryStore, StoreError, Version,
};
use cinema_booking_core::types::{BookingId, ShowtimeId};
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

const INVENTORY: &str = "seat_inventory";
const BOOKING: &str = "booking";
const WRITE_CONFLICTS_TOTAL: &str = "booking_store_write_conflicts_total";

/// PostgreSQL-backed [`BookingRepository`].
#[derive(Clone, Debug)]
pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    /// Connect to `database_url` with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(database("Failed to connect"))?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

fn database(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| StoreError::Database(format!("{context}: {e}"))
}

fn to_column(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value())
        .map_err(|_| StoreError::Database(format!("Version {version} exceeds BIGINT")))
}

fn from_column(version: i64) -> Result<Version, StoreError> {
    u64::try_from(version)
        .map(Version::new)
        .map_err(|_| StoreError::Database(format!("Negative stored version {version}")))
}

fn decode<T: DeserializeOwned>(row: &PgRow) -> Result<(T, Version), StoreError> {
    let document: serde_json::Value =
        row.try_get("document").map_err(database("Failed to read document"))?;
    let version: i64 = row.try_get("version").map_err(database("Failed to read version"))?;
    let aggregate =
        serde_json::from_value(document).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok((aggregate, from_column(version)?))
}

fn decode_bookings(rows: &[PgRow]) -> Result<Vec<Booking>, StoreError> {
    rows.iter()
        .map(|row| decode::<Booking>(row).map(|(b, v)| with_version(b, v)))
        .collect()
}

fn with_version(mut booking: Booking, version: Version) -> Booking {
    booking.set_version(version);
    booking
}

fn conflict(aggregate: &'static str, id: String, expected: Version) -> StoreError {
    metrics::counter!(WRITE_CONFLICTS_TOTAL, "aggregate" => aggregate).increment(1);
    tracing::debug!(aggregate, id = %id, expected = %expected, "Conditional write lost the race");
    StoreError::ConcurrencyConflict { aggregate, id, expected }
}

/// Conditionally write an inventory without touching its in-memory version.
async fn write_inventory(
    conn: &mut PgConnection,
    inventory: &SeatInventory,
) -> Result<(), StoreError> {
    let document =
        serde_json::to_value(inventory).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let expected = inventory.version();
    let next = to_column(expected.next())?;
    let showtime_id = *inventory.showtime_id().as_uuid();

    let result = if expected.is_initial() {
        sqlx::query(
            r"
            INSERT INTO seat_inventories (showtime_id, inventory_id, document, version)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (showtime_id) DO NOTHING
            ",
        )
        .bind(showtime_id)
        .bind(*inventory.id().as_uuid())
        .bind(&document)
        .bind(next)
        .execute(&mut *conn)
        .await
    } else {
        sqlx::query(
            r"
            UPDATE seat_inventories
            SET document = $2, version = $3, updated_at = now()
            WHERE showtime_id = $1 AND version = $4
            ",
        )
        .bind(showtime_id)
        .bind(&document)
        .bind(next)
        .bind(to_column(expected)?)
        .execute(&mut *conn)
        .await
    }
    .map_err(database("Failed to write seat inventory"))?;

    if result.rows_affected() == 0 {
        return Err(conflict(INVENTORY, inventory.showtime_id().to_string(), expected));
    }
    Ok(())
}

/// Conditionally write a booking without touching its in-memory version.
async fn write_booking(conn: &mut PgConnection, booking: &Booking) -> Result<(), StoreError> {
    let document =
        serde_json::to_value(booking).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let expected = booking.version();
    let next = to_column(expected.next())?;

    let result = if expected.is_initial() {
        sqlx::query(
            r"
            INSERT INTO bookings (
                booking_id, showtime_id, customer_id, status, payment_reference,
                hold_expires_at, confirmed_at, fulfilled, document, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (booking_id) DO NOTHING
            ",
        )
        .bind(*booking.id().as_uuid())
        .bind(*booking.showtime_id().as_uuid())
        .bind(*booking.customer_id().as_uuid())
        .bind(booking.status().as_str())
        .bind(booking.payment_reference())
        .bind(booking.hold_expires_at())
        .bind(booking.confirmed_at())
        .bind(booking.is_fulfilled())
        .bind(&document)
        .bind(next)
        .execute(&mut *conn)
        .await
    } else {
        sqlx::query(
            r"
            UPDATE bookings
            SET status = $2, payment_reference = $3, hold_expires_at = $4, confirmed_at = $5,
                fulfilled = $6, document = $7, version = $8, updated_at = now()
            WHERE booking_id = $1 AND version = $9
            ",
        )
        .bind(*booking.id().as_uuid())
        .bind(booking.status().as_str())
        .bind(booking.payment_reference())
        .bind(booking.hold_expires_at())
        .bind(booking.confirmed_at())
        .bind(booking.is_fulfilled())
        .bind(&document)
        .bind(next)
        .bind(to_column(expected)?)
        .execute(&mut *conn)
        .await
    }
    .map_err(database("Failed to write booking"))?;

    if result.rows_affected() == 0 {
        return Err(conflict(BOOKING, booking.id().to_string(), expected));
    }
    Ok(())
}

impl SeatInventoryStore for PostgresBookingRepository {
    async fn inventory_by_showtime(
        &self,
        showtime_id: ShowtimeId,
    ) -> Result<Option<SeatInventory>, StoreError> {
        let row = sqlx::query(
            "SELECT document, version FROM seat_inventories WHERE showtime_id = $1",
        )
        .bind(*showtime_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(database("Failed to load seat inventory"))?;

        row.as_ref()
            .map(decode::<SeatInventory>)
            .transpose()
            .map(|found| {
                found.map(|(mut inventory, version)| {
                    inventory.set_version(version);
                    inventory
                })
            })
    }

    async fn save_inventory(&self, inventory: &mut SeatInventory) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(database("Failed to acquire connection"))?;
        write_inventory(&mut *conn, inventory).await?;
        inventory.set_version(inventory.version().next());
        Ok(())
    }
}

impl PostgresBookingRepository {
    /// Bookings in `status` whose hold deadline passed, served by the partial expiry indexes.
    async fn expired_with_status(
        &self,
        status: BookingStatus,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT document, version FROM bookings
            WHERE status = $1 AND hold_expires_at < $2
            ORDER BY hold_expires_at
            LIMIT $3
            ",
        )
        .bind(status.as_str())
        .bind(before)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(database("Failed to query expired holds"))?;

        decode_bookings(&rows)
    }
}

impl BookingStore for PostgresBookingRepository {
    async fn booking_by_id(&self, booking_id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query("SELECT document, version FROM bookings WHERE booking_id = $1")
            .bind(*booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(database("Failed to load booking"))?;

        row.as_ref()
            .map(decode::<Booking>)
            .transpose()
            .map(|found| found.map(|(b, v)| with_version(b, v)))
    }

    async fn booking_by_payment_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query("SELECT document, version FROM bookings WHERE payment_reference = $1")
            .bind(reference_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database("Failed to load booking by payment reference"))?;

        row.as_ref()
            .map(decode::<Booking>)
            .transpose()
            .map(|found| found.map(|(b, v)| with_version(b, v)))
    }

    async fn pending_expired_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Booking>, StoreError> {
        self.expired_with_status(BookingStatus::PendingPayment, before, limit).await
    }

    async fn processing_expired_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Booking>, StoreError> {
        self.expired_with_status(BookingStatus::PaymentProcessing, before, limit).await
    }

    async fn awaiting_fulfillment(&self, limit: usize) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT document, version FROM bookings
            WHERE status = $1 AND NOT fulfilled
            ORDER BY confirmed_at
            LIMIT $2
            ",
        )
        .bind(BookingStatus::Confirmed.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(database("Failed to query unfulfilled bookings"))?;

        decode_bookings(&rows)
    }

    async fn save_booking(&self, booking: &mut Booking) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(database("Failed to acquire connection"))?;
        write_booking(&mut *conn, booking).await?;
        booking.set_version(booking.version().next());
        Ok(())
    }
}

impl BookingRepository for PostgresBookingRepository {
    async fn save_all(
        &self,
        inventory: &mut SeatInventory,
        booking: &mut Booking,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(database("Failed to start transaction"))?;

        // Dropping the transaction on error rolls both writes back
        write_inventory(&mut *tx, inventory).await?;
        write_booking(&mut *tx, booking).await?;

        tx.commit().await.map_err(database("Failed to commit transaction"))?;

        inventory.set_version(inventory.version().next());
        booking.set_version(booking.version().next());
        tracing::debug!(
            showtime_id = %inventory.showtime_id(),
            booking_id = %booking.id(),
            status = %booking.status(),
            "Saved inventory and booking"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_columns_round_trip() {
        assert_eq!(to_column(Version::new(42)).ok(), Some(42));
        assert_eq!(from_column(42).ok(), Some(Version::new(42)));
    }

    #[test]
    fn test_out_of_range_versions_are_rejected() {
        assert!(matches!(to_column(Version::new(u64::MAX)), Err(StoreError::Database(_))));
        assert!(matches!(from_column(-1), Err(StoreError::Database(_))));
    }

    #[test]
    fn test_conflict_names_the_aggregate() {
        let error = conflict(BOOKING, "b-1".to_string(), Version::new(3));
        assert!(error.is_conflict());
        assert_eq!(
            error.to_string(),
            "Concurrency conflict on booking b-1: expected version 3"
        );
    }

    #[test]
    fn test_conflict_metric_follows_prometheus_naming() {
        assert!(WRITE_CONFLICTS_TOTAL.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        assert!(WRITE_CONFLICTS_TOTAL.ends_with("_total"));
    }
}
