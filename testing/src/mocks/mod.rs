//! Mock and in-memory implementations of the core ports.
//!
//! **WARNING**: Do NOT use in production. These are for testing only!

mod artifacts;
mod catalog;
mod clock;
mod gateway;
mod publisher;
mod repository;

pub use artifacts::MockArtifactGenerator;
pub use catalog::InMemoryShowtimeCatalog;
pub use clock::{FixedClock, ManualClock, test_clock};
pub use gateway::MockPaymentGateway;
pub use publisher::RecordingPublisher;
pub use repository::InMemoryBookingRepository;
