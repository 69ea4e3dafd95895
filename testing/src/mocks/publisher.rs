//! Recording event publisher.

use cinema_booking_core::events::BookingEvent;
use cinema_booking_core::publisher::{EventPublisher, PublishError};
use std::sync::{Arc, Mutex};

/// Publisher that keeps every event in memory.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<BookingEvent>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingPublisher {
    /// Create a new recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (events are still not recorded).
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn fail_all(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// All published events, in order.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Versioned type names of all published events, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(BookingEvent::event_type).collect()
    }

    /// Number of events with the given versioned type name.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.event_types().iter().filter(|t| **t == event_type).count()
    }

    /// Forget every recorded event.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn publish(&self, event: BookingEvent) -> Result<(), PublishError> {
        if *self.failing.lock().unwrap() {
            return Err(PublishError::Transport {
                event_type: event.event_type(),
                reason: "broker unavailable".to_string(),
            });
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
