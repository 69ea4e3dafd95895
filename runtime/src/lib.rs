//! # Cinema Booking Runtime
//!
//! Use cases of the cinema booking core, built on the aggregates and ports
//! of `cinema-booking-core`.
//!
//! ## Components
//!
//! - **[`BookingService`]**: create, pay for, cancel and check in bookings;
//!   apply payment gateway callbacks
//! - **[`ExpirationSweeper`]**: periodically expires lapsed holds
//! - **[`FulfillmentWorker`]**: issues tickets and invoices for confirmed bookings
//! - **[`retry`]**: bounded exponential backoff for conflicts and transient failures
//! - **[`metrics`]**: Prometheus metrics
//!
//! Every state change is a load-validate-mutate-save step against versioned
//! aggregates. A version conflict re-runs the step from fresh state.
//!
//! ## Example
//!
//! ```ignore
//! use cinema_booking_runtime::{BookingConfig, BookingService, CreateBookingRequest};
//!
//! let service = BookingService::new(
//!     repository,
//!     catalog,
//!     gateway,
//!     publisher,
//!     SystemClock,
//!     BookingConfig::default(),
//! );
//!
//! let booking = service
//!     .create_booking(CreateBookingRequest { customer_id, showtime_id, seats })
//!     .await?;
//! let booking = service.initiate_payment(booking.id(), customer_id).await?;
//! ```

/// Booking service configuration
pub mod config;

/// Service error type
pub mod error;

/// Ticket fulfillment worker
pub mod fulfillment;

/// Prometheus metrics for observability
pub mod metrics;

/// Payment callback handling
pub mod payment;

/// Event publisher adapters
pub mod publisher;

/// Retry logic with exponential backoff
pub mod retry;

/// Booking orchestration service
pub mod service;

/// Expiration sweeper
pub mod sweeper;

pub use config::BookingConfig;
pub use error::BookingServiceError;
pub use fulfillment::{FulfillmentConfig, FulfillmentOutcome, FulfillmentWorker};
pub use payment::CallbackOutcome;
pub use publisher::{QueuePublisher, TracingPublisher};
pub use retry::RetryPolicy;
pub use service::{BookingService, CreateBookingRequest, SeatAvailability};
pub use sweeper::{ExpirationSweeper, SweepFailure, SweepReport, SweeperConfig};
