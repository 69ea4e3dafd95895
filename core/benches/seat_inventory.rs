//! Seat inventory benchmarks
//!
//! Batch hold, expiry sweep and release on a large auditorium.
//!
//! Run with: `cargo bench -p cinema-booking-core`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use chrono::{Duration, Utc};
use cinema_booking_core::{BookingId, ScreenId, SeatInventory, SeatNumber, ShowtimeId};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

const ROWS: [char; 20] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V',
];
const SEATS_PER_ROW: usize = 30;

fn auditorium() -> SeatInventory {
    let seats = ROWS
        .iter()
        .flat_map(|row| (1..=SEATS_PER_ROW).map(move |n| SeatNumber::new(format!("{row}{n}"))));
    SeatInventory::create(ScreenId::new(), ShowtimeId::new(), seats).expect("non-empty auditorium")
}

fn bench_hold_release(c: &mut Criterion) {
    let inventory = auditorium();
    let request: Vec<SeatNumber> = (1..=8).map(|n| SeatNumber::new(format!("K{n}"))).collect();
    let deadline = Utc::now() + Duration::minutes(15);

    let mut group = c.benchmark_group("seat_inventory");
    group.throughput(Throughput::Elements(request.len() as u64));

    group.bench_function("hold_8_of_600", |b| {
        b.iter(|| {
            let mut inventory = inventory.clone();
            inventory
                .hold_seats(black_box(&request), BookingId::new(), deadline)
                .expect("seats available");
            inventory
        });
    });

    group.bench_function("hold_then_release_8_of_600", |b| {
        b.iter(|| {
            let mut inventory = inventory.clone();
            let booking = BookingId::new();
            inventory
                .hold_seats(&request, booking, deadline)
                .expect("seats available");
            black_box(inventory.release_seats(&request, booking))
        });
    });

    group.finish();
}

fn bench_release_expired(c: &mut Criterion) {
    let mut held = auditorium();
    let past = Utc::now() - Duration::minutes(1);
    for row in ROWS {
        let seats: Vec<SeatNumber> = (1..=SEATS_PER_ROW)
            .map(|n| SeatNumber::new(format!("{row}{n}")))
            .collect();
        held.hold_seats(&seats, BookingId::new(), past).expect("seats available");
    }

    c.bench_function("release_expired_holds_600", |b| {
        b.iter(|| {
            let mut inventory = held.clone();
            black_box(inventory.release_expired_holds(Utc::now()))
        });
    });
}

criterion_group!(benches, bench_hold_release, bench_release_expired);
criterion_main!(benches);
