//! Background worker for the cinema booking core.
//!
//! Runs two loops against the Postgres repository:
//!
//! - the [`ExpirationSweeper`](cinema_booking_runtime::ExpirationSweeper),
//!   which frees seats whose hold lapsed
//! - the [`FulfillmentWorker`](cinema_booking_runtime::FulfillmentWorker),
//!   which issues tickets and invoices for confirmed bookings
//!
//! Configuration comes from the environment (see [`config::Config`]), and
//! both loops stop on Ctrl+C or SIGTERM.

pub mod artifacts;
pub mod config;
pub mod lifecycle;

pub use artifacts::FileArtifactGenerator;
pub use config::{Config, ConfigError};
pub use lifecycle::{Application, shutdown_signal};
