//! # Cinema Booking Core
//!
//! Seat inventory and booking aggregates for a cinema ticketing backend, plus
//! the ports the orchestration layer drives.
//!
//! ## Core Concepts
//!
//! - **Seat**: available / held / reserved, with hold owner and deadline
//! - **SeatInventory**: every seat of one showtime; batch hold, reserve, release
//! - **BookingTicket**: per-seat ticket with its own pending / issued / used / cancelled lifecycle
//! - **Booking**: tickets, pricing, payment state and invoice; enforces the booking state machine
//! - **Ports**: stores, catalog, payment gateway, event publisher, artifact generator, clock
//!
//! ## Architecture Principles
//!
//! - Domain methods are synchronous and take `now` explicitly
//! - A failed domain operation leaves its aggregate unchanged
//! - Every aggregate carries a version; saves are conditional writes
//! - Ports are traits returning `Send` futures, implemented in the runtime,
//!   testing and postgres crates
//!
//! ## Example
//!
//! ```
//! use cinema_booking_core::inventory::SeatInventory;
//! use cinema_booking_core::types::{BookingId, ScreenId, SeatNumber, ShowtimeId};
//! use chrono::{Duration, Utc};
//!
//! # fn main() -> Result<(), cinema_booking_core::error::DomainError> {
//! let seats = ["A1", "A2", "A3"].map(SeatNumber::new);
//! let mut inventory = SeatInventory::create(ScreenId::new(), ShowtimeId::new(), seats)?;
//!
//! let booking = BookingId::new();
//! let hold = [SeatNumber::new("A1"), SeatNumber::new("A2")];
//! inventory.hold_seats(&hold, booking, Utc::now() + Duration::minutes(15))?;
//!
//! assert_eq!(inventory.available_seats(), vec![SeatNumber::new("A3")]);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod booking;
pub mod catalog;
pub mod environment;
pub mod error;
pub mod events;
pub mod gateway;
pub mod inventory;
pub mod publisher;
pub mod seat;
pub mod store;
pub mod ticket;
pub mod types;

pub use booking::{Booking, BookingStatus, PaymentDetails};
pub use error::DomainError;
pub use events::{BookingEvent, CancellationReason};
pub use inventory::{ExpiredHolds, SeatInventory};
pub use seat::{Seat, SeatState, SeatStatus};
pub use store::{StoreError, Version};
pub use ticket::{BookingTicket, TicketStatus};
pub use types::{
    ArtifactRef, BookingId, Currency, CustomerId, InventoryId, Money, ScreenId, SeatNumber,
    ShowtimeId, TicketId,
};
