//! Expiration sweeper passes and the background loop.

#![allow(clippy::unwrap_used)] // Test code uses unwrap for clarity

mod common;

use chrono::Duration;
use cinema_booking_core::environment::Clock;
use cinema_booking_core::store::{BookingRepository, StoreError};
use cinema_booking_core::{
    BookingEvent, BookingStatus, CancellationReason, SeatStatus, TicketStatus,
};
use cinema_booking_runtime::BookingServiceError;
use common::Harness;
use std::sync::Arc;
use tokio::sync::broadcast;

#[tokio::test]
async fn sweep_expires_only_lapsed_bookings() {
    let h = Harness::new();
    let early = h.create(&["A1", "A2"]).await;
    h.clock.advance(Duration::minutes(10));
    let late = h.create(&["B1"]).await;
    h.clock.advance(Duration::minutes(6));
    let sweeper = h.sweeper(100);

    let report = sweeper.sweep_once().await.unwrap();

    assert_eq!(report.expired, vec![early.id()]);
    assert!(report.lapsed_cancelled.is_empty());
    assert_eq!(report.seats_released, 2);
    assert!(report.failures.is_empty());

    let expired = h.repository.booking(early.id()).unwrap();
    assert_eq!(expired.status(), BookingStatus::Expired);
    assert!(expired.tickets().iter().all(|t| t.status() == TicketStatus::Cancelled));
    assert_eq!(h.repository.booking(late.id()).unwrap().status(), BookingStatus::PendingPayment);

    let inventory = h.repository.inventory(h.seating.showtime_id).unwrap();
    assert_eq!(inventory.seat(&Harness::seat("A1")).unwrap().status(), SeatStatus::Available);
    assert_eq!(inventory.seat(&Harness::seat("B1")).unwrap().held_by(), Some(late.id()));
    assert_eq!(h.publisher.count("BookingExpired.v1"), 1);

    let again = sweeper.sweep_once().await.unwrap();
    assert!(again.is_empty());
    assert_eq!(h.publisher.count("BookingExpired.v1"), 1);
}

#[tokio::test]
async fn sweep_leaves_holds_alone_at_the_deadline() {
    let h = Harness::new();
    let booking = h.create(&["A1"]).await;
    h.clock.set(booking.hold_expires_at());

    let report = h.sweeper(100).sweep_once().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(h.repository.booking(booking.id()).unwrap().status(), BookingStatus::PendingPayment);
}

#[tokio::test]
async fn sweep_cancels_payment_processing_bookings_whose_hold_lapsed() {
    let h = Harness::new();
    let pending = h.create(&["A1"]).await;
    let paying = h.awaiting_payment(&["A2", "A3"]).await;
    h.clock.advance(Duration::minutes(16));

    let report = h.sweeper(100).sweep_once().await.unwrap();

    assert_eq!(report.expired, vec![pending.id()]);
    assert_eq!(report.lapsed_cancelled, vec![paying.id()]);
    assert_eq!(report.seats_released, 3);
    assert_eq!(report.affected_bookings().len(), 2);
    assert_eq!(h.repository.booking(paying.id()).unwrap().status(), BookingStatus::Cancelled);
    assert!(h.publisher.events().iter().any(|e| matches!(
        e,
        BookingEvent::BookingCancelled {
            booking_id,
            reason: CancellationReason::HoldLapsed,
            ..
        } if *booking_id == paying.id()
    )));

    let inventory = h.repository.inventory(h.seating.showtime_id).unwrap();
    assert_eq!(inventory.available_seats().len(), 10);
}

#[tokio::test]
async fn sweep_finishes_lapsed_cancellations_left_by_an_interrupted_pass() {
    let h = Harness::new();
    let pending = h.create(&["A1"]).await;
    let paying = h.awaiting_payment(&["A2", "A3"]).await;
    h.clock.advance(Duration::minutes(16));
    let now = h.clock.now();

    // Expiry of the pending booking commits, then the pass stops
    let mut inventory = h.repository.inventory(h.seating.showtime_id).unwrap();
    let mut expired = h.repository.booking(pending.id()).unwrap();
    let released = inventory.release_expired_holds(now);
    assert!(released.bookings.contains(&paying.id()));
    inventory.release_seats(&expired.seat_numbers(), expired.id());
    expired.expire(now).unwrap();
    h.repository.save_all(&mut inventory, &mut expired).await.unwrap();
    assert_eq!(
        h.repository.booking(paying.id()).unwrap().status(),
        BookingStatus::PaymentProcessing
    );

    let report = h.sweeper(100).sweep_once().await.unwrap();

    assert!(report.expired.is_empty());
    assert_eq!(report.lapsed_cancelled, vec![paying.id()]);
    assert_eq!(h.repository.booking(paying.id()).unwrap().status(), BookingStatus::Cancelled);
    assert_eq!(h.publisher.count("BookingCancelled.v1"), 1);
    assert!(h.sweeper(100).sweep_once().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_leaves_lapsed_payment_processing_with_an_intact_hold() {
    let h = Harness::new();
    let paying = h.awaiting_payment(&["A2"]).await;
    h.clock.advance(Duration::minutes(16));

    let report = h.sweeper(100).sweep_once().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(
        h.repository.booking(paying.id()).unwrap().status(),
        BookingStatus::PaymentProcessing
    );
    let inventory = h.repository.inventory(h.seating.showtime_id).unwrap();
    assert_eq!(inventory.seat(&Harness::seat("A2")).unwrap().held_by(), Some(paying.id()));
}

#[tokio::test]
async fn sweep_never_touches_confirmed_bookings() {
    let h = Harness::new();
    let booking = h.confirmed(&["B2"]).await;
    h.clock.advance(Duration::hours(2));

    let report = h.sweeper(100).sweep_once().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(h.repository.booking(booking.id()).unwrap().status(), BookingStatus::Confirmed);
    let inventory = h.repository.inventory(h.seating.showtime_id).unwrap();
    assert_eq!(inventory.reserved_seats(), vec![Harness::seat("B2")]);
}

#[tokio::test]
async fn sweep_isolates_per_booking_failures() {
    let h = Harness::new();
    let first = h.create(&["A1"]).await;
    h.clock.advance(Duration::minutes(1));
    let second = h.create(&["A2"]).await;
    h.clock.advance(Duration::minutes(20));
    h.repository.fail_next_save(StoreError::Database("deadlock detected".to_string()));
    let sweeper = h.sweeper(100);

    let report = sweeper.sweep_once().await.unwrap();

    assert_eq!(report.expired, vec![second.id()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].booking_id, first.id());
    assert!(matches!(
        report.failures[0].error,
        BookingServiceError::Store(StoreError::Database(_))
    ));

    let retry = sweeper.sweep_once().await.unwrap();
    assert_eq!(retry.expired, vec![first.id()]);
    assert!(retry.failures.is_empty());
}

#[tokio::test]
async fn sweep_respects_the_batch_size() {
    let h = Harness::new();
    for seat in ["A1", "A2", "A3"] {
        h.create(&[seat]).await;
    }
    h.clock.advance(Duration::minutes(30));
    let sweeper = h.sweeper(2);

    assert_eq!(sweeper.sweep_once().await.unwrap().expired.len(), 2);
    assert_eq!(sweeper.sweep_once().await.unwrap().expired.len(), 1);
    assert!(sweeper.sweep_once().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweeper_loop_stops_on_shutdown() {
    let h = Harness::new();
    let booking = h.create(&["A5"]).await;
    h.clock.advance(Duration::minutes(16));
    let sweeper = Arc::new(h.sweeper(100));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let task = tokio::spawn({
        let sweeper = Arc::clone(&sweeper);
        async move { sweeper.run(shutdown_rx).await }
    });

    // The first tick fires immediately
    for _ in 0..100 {
        if h.repository.booking(booking.id()).unwrap().status() == BookingStatus::Expired {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(h.repository.booking(booking.id()).unwrap().status(), BookingStatus::Expired);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}
