//! Mock ticket artifact generator.

use cinema_booking_core::artifacts::{ArtifactError, TicketArtifactGenerator, TicketArtifactRequest};
use cinema_booking_core::{ArtifactRef, Booking};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    tickets: Vec<TicketArtifactRequest>,
    invoices: usize,
    transient_failures: usize,
}

/// Artifact generator that returns predictable references.
///
/// QR references are `mem://qr/<ticket code>.png`, invoices
/// `mem://invoice/<booking id>.pdf`.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct MockArtifactGenerator {
    state: Arc<Mutex<State>>,
}

impl MockArtifactGenerator {
    /// Create a new mock generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` render calls with [`ArtifactError::Transient`].
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn fail_transiently(&self, count: usize) {
        self.state.lock().unwrap().transient_failures = count;
    }

    /// Number of successful ticket renders.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn tickets_rendered(&self) -> usize {
        self.state.lock().unwrap().tickets.len()
    }

    /// Number of successful invoice renders.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn invoices_rendered(&self) -> usize {
        self.state.lock().unwrap().invoices
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn take_failure(&self) -> Result<(), ArtifactError> {
        let mut state = self.state.lock().unwrap();
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(ArtifactError::Transient("bucket unavailable".to_string()));
        }
        Ok(())
    }
}

impl TicketArtifactGenerator for MockArtifactGenerator {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn render_ticket(
        &self,
        request: &TicketArtifactRequest,
    ) -> Result<ArtifactRef, ArtifactError> {
        self.take_failure()?;
        self.state.lock().unwrap().tickets.push(request.clone());
        Ok(ArtifactRef::new(format!("mem://qr/{}.png", request.ticket_code)))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn render_invoice(&self, booking: &Booking) -> Result<ArtifactRef, ArtifactError> {
        self.take_failure()?;
        self.state.lock().unwrap().invoices += 1;
        Ok(ArtifactRef::new(format!("mem://invoice/{}.pdf", booking.id())))
    }
}
