//! Fixtures for common showtimes, inventories and bookings.
//!
//! Times are anchored on [`test_clock`](crate::test_clock) so results are
//! reproducible.

#![allow(clippy::expect_used)] // Fixtures are built from known-good constants

use chrono::Duration;
use cinema_booking_core::catalog::ShowtimeSeating;
use cinema_booking_core::environment::Clock;
use cinema_booking_core::{
    Booking, BookingId, BookingTicket, Currency, CustomerId, Money, ScreenId, SeatInventory,
    SeatNumber, ShowtimeId,
};

use crate::test_clock;

/// Price of one ticket in fixtures (IDR 50,000.00)
pub const TICKET_PRICE: Money = Money::new(5_000_000, Currency::IDR);

/// Service fee in fixtures (IDR 5,000.00)
pub const SERVICE_FEE: Money = Money::new(500_000, Currency::IDR);

/// Default hold length used by fixtures
#[must_use]
pub fn hold_duration() -> Duration {
    Duration::minutes(15)
}

/// Convert string literals to seat numbers.
#[must_use]
pub fn seat_numbers(seats: &[&str]) -> Vec<SeatNumber> {
    seats.iter().copied().map(SeatNumber::new).collect()
}

/// A small auditorium: rows A and B, five seats each.
#[must_use]
pub fn small_auditorium() -> Vec<SeatNumber> {
    ["A", "B"]
        .iter()
        .flat_map(|row| (1..=5).map(move |n| SeatNumber::new(format!("{row}{n}"))))
        .collect()
}

/// Seating for a fresh showtime starting one day after the test clock.
#[must_use]
pub fn seating(seats: &[SeatNumber]) -> ShowtimeSeating {
    ShowtimeSeating {
        showtime_id: ShowtimeId::new(),
        screen_id: ScreenId::new(),
        seat_numbers: seats.to_vec(),
        ticket_price: TICKET_PRICE,
        starts_at: test_clock().now() + Duration::days(1),
    }
}

/// An unsaved inventory for a fresh showtime.
#[must_use]
pub fn inventory(seats: &[&str]) -> SeatInventory {
    SeatInventory::create(ScreenId::new(), ShowtimeId::new(), seat_numbers(seats))
        .expect("fixture seats are non-empty")
}

/// An unsaved `PENDING_PAYMENT` booking whose hold ends 15 minutes after the test clock.
#[must_use]
pub fn pending_booking(showtime_id: ShowtimeId, seats: &[&str]) -> Booking {
    let now = test_clock().now();
    let tickets = seat_numbers(seats)
        .into_iter()
        .map(|seat| BookingTicket::new(seat, TICKET_PRICE))
        .collect();
    Booking::create(
        BookingId::new(),
        CustomerId::new(),
        showtime_id,
        tickets,
        SERVICE_FEE,
        now,
        now + hold_duration(),
    )
    .expect("fixture booking is valid")
}
