//! # Cinema Booking Testing
//!
//! Testing utilities and in-memory adapters for the cinema booking core.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory [`InMemoryBookingRepository`] with optimistic versioning and fault injection
//! - Mock payment gateway, event publisher, artifact generator and showtime catalog
//! - Fixtures for common showtimes and bookings
//! - proptest strategies for domain types
//!
//! ## Example
//!
//! ```
//! use cinema_booking_testing::{InMemoryBookingRepository, test_clock};
//! use cinema_booking_core::environment::Clock;
//!
//! let clock = test_clock();
//! let repository = InMemoryBookingRepository::new();
//! assert_eq!(clock.now(), clock.now());
//! assert_eq!(repository.save_calls(), 0);
//! ```

pub mod fixtures;
pub mod mocks;
pub mod properties;

// Re-export commonly used items
pub use mocks::{
    FixedClock, InMemoryBookingRepository, InMemoryShowtimeCatalog, ManualClock,
    MockArtifactGenerator, MockPaymentGateway, RecordingPublisher, test_clock,
};

/// Install a test-friendly tracing subscriber once per process.
///
/// Output goes through the test writer so it only shows for failing tests.
/// Honors `RUST_LOG`, defaulting to `debug` for the booking crates.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,cinema_booking=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
