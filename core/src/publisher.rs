//! Event publisher port.

use crate::events::BookingEvent;
use thiserror::Error;

/// Errors from publishing an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Transport refused or dropped the event
    #[error("Failed to publish {event_type}: {reason}")]
    Transport {
        /// Versioned event type
        event_type: &'static str,
        /// Cause
        reason: String,
    },

    /// Consumer side is gone
    #[error("Event channel closed")]
    Closed,
}

/// Publishes committed domain events
pub trait EventPublisher: Send + Sync {
    /// Publish one event.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the transport fails. Callers log the
    /// failure; the commit that produced the event stands.
    fn publish(
        &self,
        event: BookingEvent,
    ) -> impl std::future::Future<Output = Result<(), PublishError>> + Send;
}
