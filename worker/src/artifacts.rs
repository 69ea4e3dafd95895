//! File-system ticket artifacts.
//!
//! Layout under the root directory:
//!
//! ```text
//! qr/<ticket code>.txt       QR payload for one ticket
//! invoices/<booking id>.txt  plain-text invoice
//! ```
//!
//! Rendering is deterministic, so re-rendering after a crash overwrites the
//! file with identical content.

use cinema_booking_core::artifacts::{ArtifactError, TicketArtifactGenerator, TicketArtifactRequest};
use cinema_booking_core::{ArtifactRef, Booking};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

/// Writes ticket artifacts below a root directory
#[derive(Debug, Clone)]
pub struct FileArtifactGenerator {
    root: PathBuf,
}

impl FileArtifactGenerator {
    /// Create a generator writing below `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write(
        &self,
        dir: &str,
        name: &str,
        contents: String,
    ) -> Result<ArtifactRef, ArtifactError> {
        let dir = self.root.join(dir);
        tokio::fs::create_dir_all(&dir).await.map_err(classify)?;

        let path = dir.join(name);
        tokio::fs::write(&path, contents).await.map_err(classify)?;
        tracing::debug!(path = %path.display(), "Wrote artifact");
        Ok(ArtifactRef::new(format!("file://{}", path.display())))
    }
}

/// Payload encoded in a ticket QR code.
///
/// `<ticket code>:<sha256(qr seed, ticket code)>`; the digest lets the
/// check-in desk verify a code without a database lookup.
#[must_use]
pub fn qr_payload(request: &TicketArtifactRequest) -> String {
    let digest = Sha256::new()
        .chain_update(request.qr_seed.as_bytes())
        .chain_update(b":")
        .chain_update(request.ticket_code.as_bytes())
        .finalize();
    format!("{}:{digest:x}", request.ticket_code)
}

/// Plain-text invoice for a booking.
#[must_use]
pub fn invoice_text(booking: &Booking) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "INVOICE {}", booking.id());
    let _ = writeln!(text, "Showtime: {}", booking.showtime_id());
    if let Some(payment) = booking.payment() {
        let _ = writeln!(text, "Payment reference: {}", payment.reference_id);
        if let Some(method) = &payment.method {
            let _ = writeln!(text, "Payment method: {method}");
        }
        if let Some(paid_at) = payment.paid_at {
            let _ = writeln!(text, "Paid at: {}", paid_at.to_rfc3339());
        }
    }
    text.push('\n');
    for ticket in booking.tickets() {
        let _ = writeln!(text, "Seat {:<6} {}", ticket.seat_number(), ticket.price());
    }
    let _ = writeln!(text, "Service fee {}", booking.service_fee());
    let _ = writeln!(text, "Total       {}", booking.total_amount());
    text
}

fn classify(e: io::Error) -> ArtifactError {
    match e.kind() {
        io::ErrorKind::PermissionDenied | io::ErrorKind::InvalidInput => {
            ArtifactError::Render(e.to_string())
        }
        _ => ArtifactError::Transient(e.to_string()),
    }
}

impl TicketArtifactGenerator for FileArtifactGenerator {
    async fn render_ticket(
        &self,
        request: &TicketArtifactRequest,
    ) -> Result<ArtifactRef, ArtifactError> {
        if request.ticket_code.contains(['/', '\\']) {
            return Err(ArtifactError::Render(format!(
                "Unsafe ticket code {}",
                request.ticket_code
            )));
        }
        self.write("qr", &format!("{}.txt", request.ticket_code), qr_payload(request))
            .await
    }

    async fn render_invoice(&self, booking: &Booking) -> Result<ArtifactRef, ArtifactError> {
        self.write("invoices", &format!("{}.txt", booking.id()), invoice_text(booking))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cinema_booking_core::environment::Clock;
    use cinema_booking_core::{BookingId, SeatNumber, ShowtimeId};
    use cinema_booking_testing::{fixtures, test_clock};

    fn request(code: &str) -> TicketArtifactRequest {
        TicketArtifactRequest {
            booking_id: BookingId::new(),
            seat: SeatNumber::new("A1"),
            ticket_code: code.to_string(),
            qr_seed: "seed".to_string(),
        }
    }

    #[test]
    fn test_qr_payload_is_deterministic() {
        let payload = qr_payload(&request("TKT-1A2B3C4D-A1"));

        assert!(payload.starts_with("TKT-1A2B3C4D-A1:"));
        assert_eq!(payload.len(), "TKT-1A2B3C4D-A1:".len() + 64);
        assert_eq!(payload, qr_payload(&request("TKT-1A2B3C4D-A1")));
        assert_ne!(payload, qr_payload(&request("TKT-1A2B3C4D-A2")));
    }

    #[tokio::test]
    async fn test_render_ticket_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileArtifactGenerator::new(dir.path());
        let request = request("TKT-00000000-B4");

        let artifact = generator.render_ticket(&request).await.unwrap();

        let path = dir.path().join("qr").join("TKT-00000000-B4.txt");
        assert_eq!(artifact.as_str(), format!("file://{}", path.display()));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), qr_payload(&request));
    }

    #[tokio::test]
    async fn test_render_invoice_lists_every_seat() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileArtifactGenerator::new(dir.path());
        let mut booking = fixtures::pending_booking(ShowtimeId::new(), &["A1", "A2"]);
        let now = test_clock().now();
        booking
            .initiate_payment("pay_1".to_string(), "https://pay.example/pay_1".to_string())
            .unwrap();
        booking.confirm_payment(Some("QRIS".to_string()), now, now).unwrap();

        let artifact = generator.render_invoice(&booking).await.unwrap();

        assert!(artifact.as_str().ends_with(&format!("{}.txt", booking.id())));
        let invoice = dir.path().join("invoices").join(format!("{}.txt", booking.id()));
        let text = tokio::fs::read_to_string(invoice).await.unwrap();
        assert!(text.contains("Payment reference: pay_1"));
        assert!(text.contains("Payment method: QRIS"));
        assert!(text.contains("Seat A1"));
        assert!(text.contains("Seat A2"));
        assert!(text.contains(&format!("Total       {}", booking.total_amount())));
    }

    #[tokio::test]
    async fn test_ticket_codes_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileArtifactGenerator::new(dir.path());

        let err = generator.render_ticket(&request("../../etc/passwd")).await.unwrap_err();

        assert!(matches!(err, ArtifactError::Render(_)));
        assert!(!err.is_transient());
    }
}
