//! End-to-end domain scenarios across the seat inventory and booking aggregates.

#![allow(clippy::unwrap_used)] // Test code uses unwrap for clarity

use chrono::{DateTime, Duration, TimeZone, Utc};
use cinema_booking_core::{
    ArtifactRef, Booking, BookingId, BookingStatus, BookingTicket, Currency, CustomerId,
    DomainError, Money, ScreenId, SeatInventory, SeatNumber, SeatStatus, ShowtimeId,
};
use std::collections::HashMap;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 18, 30, 0).unwrap()
}

fn seat(number: &str) -> SeatNumber {
    SeatNumber::new(number)
}

fn new_booking(id: BookingId, seats: &[&str]) -> Booking {
    let price = Money::new(45_000, Currency::IDR);
    let tickets = seats.iter().map(|s| BookingTicket::new(seat(s), price)).collect();
    Booking::create(
        id,
        CustomerId::new(),
        ShowtimeId::new(),
        tickets,
        Money::new(5_000, Currency::IDR),
        now(),
        now() + Duration::minutes(15),
    )
    .unwrap()
}

#[test]
fn hold_two_of_three_seats() {
    let mut inventory = SeatInventory::create(
        ScreenId::new(),
        ShowtimeId::new(),
        [seat("A1"), seat("A2"), seat("A3")],
    )
    .unwrap();
    let b1 = BookingId::new();
    let hold_until = now() + Duration::minutes(15);

    inventory.hold_seats(&[seat("A1"), seat("A2")], b1, hold_until).unwrap();

    for number in ["A1", "A2"] {
        let held = inventory.seat(&seat(number)).unwrap();
        assert_eq!(held.status(), SeatStatus::Held);
        assert_eq!(held.held_by(), Some(b1));
        assert_eq!(held.held_until(), Some(hold_until));
    }
    assert_eq!(inventory.seat(&seat("A3")).unwrap().status(), SeatStatus::Available);
}

#[test]
fn overlapping_hold_fails_without_touching_free_seat() {
    let mut inventory = SeatInventory::create(
        ScreenId::new(),
        ShowtimeId::new(),
        [seat("A1"), seat("A2"), seat("A3")],
    )
    .unwrap();
    let b1 = BookingId::new();
    let b2 = BookingId::new();
    inventory
        .hold_seats(&[seat("A1"), seat("A2")], b1, now() + Duration::minutes(15))
        .unwrap();

    let err = inventory
        .hold_seats(&[seat("A2"), seat("A3")], b2, now() + Duration::minutes(15))
        .unwrap_err();

    assert_eq!(err, DomainError::SeatNotAvailable { seat: seat("A2") });
    assert_eq!(inventory.seat(&seat("A3")).unwrap().status(), SeatStatus::Available);
    assert_eq!(inventory.seat(&seat("A2")).unwrap().held_by(), Some(b1));
}

#[test]
fn initiate_payment_moves_to_processing() {
    let mut booking = new_booking(BookingId::new(), &["A1"]);

    booking
        .initiate_payment("pay_123".to_string(), "https://pay.example/123".to_string())
        .unwrap();

    assert_eq!(booking.status(), BookingStatus::PaymentProcessing);
    assert_eq!(booking.payment_reference(), Some("pay_123"));
}

#[test]
fn confirm_before_initiate_is_rejected() {
    let mut booking = new_booking(BookingId::new(), &["A1"]);
    let before = booking.clone();

    let err = booking.confirm_payment(None, now(), now()).unwrap_err();

    assert_eq!(err, DomainError::PaymentNotInitiated);
    assert_eq!(booking, before);
}

#[test]
fn per_seat_check_in_completes_booking_on_last_ticket() {
    let mut booking = new_booking(BookingId::new(), &["A1", "A2"]);
    booking
        .initiate_payment("pay_1".to_string(), "https://pay/1".to_string())
        .unwrap();
    booking.confirm_payment(Some("card".to_string()), now(), now()).unwrap();
    let refs: HashMap<_, _> = [
        (seat("A1"), ArtifactRef::new("qr/a1.png")),
        (seat("A2"), ArtifactRef::new("qr/a2.png")),
    ]
    .into_iter()
    .collect();
    booking.issue_tickets(&refs, now()).unwrap();

    let doors_open = now() + Duration::minutes(40);
    booking.check_in_ticket(&seat("A1"), doors_open).unwrap();
    assert_eq!(booking.status(), BookingStatus::Confirmed);
    assert_eq!(booking.checked_in_at(), None);

    booking.check_in_ticket(&seat("A2"), doors_open).unwrap();
    assert_eq!(booking.status(), BookingStatus::CheckedIn);
    assert_eq!(booking.checked_in_at(), Some(doors_open));
}

#[test]
fn confirmed_booking_reserves_then_cancellation_releases() {
    let mut inventory =
        SeatInventory::create(ScreenId::new(), ShowtimeId::new(), [seat("A1"), seat("A2")])
            .unwrap();
    let id = BookingId::new();
    let mut booking = new_booking(id, &["A1", "A2"]);
    inventory
        .hold_seats(&booking.seat_numbers(), id, booking.hold_expires_at())
        .unwrap();

    booking.initiate_payment("r".to_string(), "u".to_string()).unwrap();
    booking.confirm_payment(None, now(), now()).unwrap();
    inventory.reserve_seats(&booking.seat_numbers(), id).unwrap();
    assert_eq!(inventory.reserved_seats().len(), 2);
    assert!(inventory.seats().all(|s| s.held_until().is_none()));

    booking.cancel(now()).unwrap();
    assert_eq!(inventory.release_seats(&booking.seat_numbers(), id), 2);
    assert_eq!(inventory.available_seats().len(), 2);
}
