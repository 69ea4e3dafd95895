//! Background loops started and stopped by the worker application.

#![allow(clippy::unwrap_used)] // Test code uses unwrap for clarity

use chrono::Duration;
use cinema_booking_core::environment::Clock;
use cinema_booking_core::{Booking, BookingStatus, SeatInventory, SeatStatus, TicketStatus};
use cinema_booking_testing::{
    InMemoryBookingRepository, ManualClock, MockArtifactGenerator, fixtures,
};
use cinema_booking_worker::{Application, Config, FileArtifactGenerator};
use std::collections::HashMap;
use tokio::sync::oneshot;

fn config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("SWEEPER_INTERVAL_SECS", "1"),
        ("FULFILLMENT_POLL_INTERVAL_SECS", "1"),
        ("SHUTDOWN_TIMEOUT", "2"),
    ]
    .into_iter()
    .collect();
    Config::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap()
}

/// An inventory with one lapsed pending booking on A1 and one confirmed booking on B1.
fn seeded(clock: &ManualClock) -> (InMemoryBookingRepository, Booking, Booking) {
    let mut inventory: SeatInventory = fixtures::inventory(&["A1", "A2", "B1"]);

    let pending = fixtures::pending_booking(inventory.showtime_id(), &["A1"]);
    inventory
        .hold_seats(&pending.seat_numbers(), pending.id(), pending.hold_expires_at())
        .unwrap();

    let mut confirmed = fixtures::pending_booking(inventory.showtime_id(), &["B1"]);
    inventory
        .hold_seats(&confirmed.seat_numbers(), confirmed.id(), confirmed.hold_expires_at())
        .unwrap();
    inventory.reserve_seats(&confirmed.seat_numbers(), confirmed.id()).unwrap();
    confirmed
        .initiate_payment("pay_1".to_string(), "https://pay.example/pay_1".to_string())
        .unwrap();
    confirmed
        .confirm_payment(Some("QRIS".to_string()), clock.now(), clock.now())
        .unwrap();

    let repository = InMemoryBookingRepository::new();
    repository.seed(inventory, [pending.clone(), confirmed.clone()]);
    (repository, pending, confirmed)
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn application_expires_holds_and_fulfills_until_shutdown() {
    let clock = ManualClock::default();
    let (repository, pending, confirmed) = seeded(&clock);
    clock.advance(Duration::hours(1));
    let artifacts = MockArtifactGenerator::new();
    let app = Application::new(&config(), repository.clone(), artifacts.clone(), clock);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(app.run_until(async move {
        let _ = stop_rx.await;
    }));

    wait_for(|| {
        repository.booking(pending.id()).unwrap().status() == BookingStatus::Expired
            && repository.booking(confirmed.id()).unwrap().is_fulfilled()
    })
    .await;
    stop_tx.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(repository.booking(pending.id()).unwrap().status(), BookingStatus::Expired);
    let fulfilled = repository.booking(confirmed.id()).unwrap();
    assert!(fulfilled.tickets().iter().all(|t| t.status() == TicketStatus::Issued));
    assert_eq!(artifacts.tickets_rendered(), 1);

    let inventory = repository.inventory(pending.showtime_id()).unwrap();
    assert_eq!(inventory.seat(&pending.seat_numbers()[0]).unwrap().status(), SeatStatus::Available);
    assert_eq!(
        inventory.seat(&confirmed.seat_numbers()[0]).unwrap().status(),
        SeatStatus::Reserved
    );
}

#[tokio::test]
async fn application_writes_artifacts_to_disk() {
    let clock = ManualClock::default();
    let (repository, _, confirmed) = seeded(&clock);
    let dir = tempfile::tempdir().unwrap();
    let app = Application::new(
        &config(),
        repository.clone(),
        FileArtifactGenerator::new(dir.path()),
        clock,
    );
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(app.run_until(async move {
        let _ = stop_rx.await;
    }));
    wait_for(|| repository.booking(confirmed.id()).unwrap().is_fulfilled()).await;
    stop_tx.send(()).unwrap();
    task.await.unwrap();

    let stored = repository.booking(confirmed.id()).unwrap();
    let code = stored.tickets()[0].ticket_code().unwrap().to_string();
    assert!(dir.path().join("qr").join(format!("{code}.txt")).exists());
    assert!(dir.path().join("invoices").join(format!("{}.txt", confirmed.id())).exists());
}

#[tokio::test]
async fn application_stops_immediately_when_shutdown_is_ready() {
    let clock = ManualClock::default();
    let app = Application::new(
        &config(),
        InMemoryBookingRepository::new(),
        MockArtifactGenerator::new(),
        clock,
    );

    tokio::time::timeout(std::time::Duration::from_secs(5), app.run_until(async {}))
        .await
        .unwrap();
}
