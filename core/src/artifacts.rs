//! Ticket artifact port (QR images, invoice documents).

use crate::booking::Booking;
use crate::types::{ArtifactRef, BookingId, SeatNumber};
use thiserror::Error;

/// Errors from artifact rendering or storage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// Storage or renderer temporarily unavailable
    #[error("Artifact storage unavailable: {0}")]
    Transient(String),

    /// Rendering failed for this input
    #[error("Failed to render artifact: {0}")]
    Render(String),
}

impl ArtifactError {
    /// Checks if the call may succeed when retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Input for rendering one ticket's QR artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketArtifactRequest {
    /// Booking
    pub booking_id: BookingId,
    /// Seat
    pub seat: SeatNumber,
    /// Code printed on the ticket
    pub ticket_code: String,
    /// Booking QR seed
    pub qr_seed: String,
}

/// Renders and stores ticket artifacts
pub trait TicketArtifactGenerator: Send + Sync {
    /// Render and store a ticket QR artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if rendering or storage fails.
    fn render_ticket(
        &self,
        request: &TicketArtifactRequest,
    ) -> impl std::future::Future<Output = Result<ArtifactRef, ArtifactError>> + Send;

    /// Render and store the booking invoice.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if rendering or storage fails.
    fn render_invoice(
        &self,
        booking: &Booking,
    ) -> impl std::future::Future<Output = Result<ArtifactRef, ArtifactError>> + Send;
}
