//! Per-seat ticket owned by a booking.

use crate::error::DomainError;
use crate::types::{ArtifactRef, Money, SeatNumber, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticket lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Created with the booking, not yet issued
    Pending,
    /// Code and QR artifact assigned
    Issued,
    /// Scanned at the door
    Used,
    /// Voided with its booking
    Cancelled,
}

impl TicketStatus {
    /// Checks if no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Used | Self::Cancelled)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Issued => "ISSUED",
            Self::Used => "USED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A ticket for one seat
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingTicket {
    id: TicketId,
    seat_number: SeatNumber,
    price: Money,
    status: TicketStatus,
    ticket_code: Option<String>,
    qr_ref: Option<ArtifactRef>,
    issued_at: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
}

impl BookingTicket {
    /// Creates a pending ticket
    #[must_use]
    pub fn new(seat_number: SeatNumber, price: Money) -> Self {
        Self {
            id: TicketId::new(),
            seat_number,
            price,
            status: TicketStatus::Pending,
            ticket_code: None,
            qr_ref: None,
            issued_at: None,
            used_at: None,
        }
    }

    /// Ticket id
    #[must_use]
    pub const fn id(&self) -> TicketId {
        self.id
    }

    /// Seat number
    #[must_use]
    pub const fn seat_number(&self) -> &SeatNumber {
        &self.seat_number
    }

    /// Ticket price
    #[must_use]
    pub const fn price(&self) -> Money {
        self.price
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> TicketStatus {
        self.status
    }

    /// Code printed on the ticket, once issued
    #[must_use]
    pub fn ticket_code(&self) -> Option<&str> {
        self.ticket_code.as_deref()
    }

    /// QR artifact, once issued
    #[must_use]
    pub const fn qr_ref(&self) -> Option<&ArtifactRef> {
        self.qr_ref.as_ref()
    }

    /// When the ticket was issued
    #[must_use]
    pub const fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    /// When the ticket was scanned
    #[must_use]
    pub const fn used_at(&self) -> Option<DateTime<Utc>> {
        self.used_at
    }

    /// Issues the ticket with its code and QR artifact.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::TicketInvalidStatus`] unless the ticket is pending.
    pub fn issue(
        &mut self,
        code: String,
        qr_ref: ArtifactRef,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != TicketStatus::Pending {
            return Err(self.invalid_status("issued"));
        }
        self.status = TicketStatus::Issued;
        self.ticket_code = Some(code);
        self.qr_ref = Some(qr_ref);
        self.issued_at = Some(now);
        Ok(())
    }

    /// Marks the ticket as scanned.
    ///
    /// # Errors
    ///
    /// - [`DomainError::TicketAlreadyUsed`] if the ticket was already scanned
    /// - [`DomainError::TicketInvalidStatus`] unless the ticket is issued
    pub fn mark_used(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.status {
            TicketStatus::Issued => {
                self.status = TicketStatus::Used;
                self.used_at = Some(now);
                Ok(())
            }
            TicketStatus::Used => Err(DomainError::TicketAlreadyUsed { ticket_id: self.id }),
            TicketStatus::Pending | TicketStatus::Cancelled => Err(self.invalid_status("used")),
        }
    }

    /// Voids the ticket.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::TicketInvalidStatus`] if the ticket is used or cancelled.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(self.invalid_status("cancelled"));
        }
        self.status = TicketStatus::Cancelled;
        Ok(())
    }

    const fn invalid_status(&self, action: &'static str) -> DomainError {
        DomainError::TicketInvalidStatus {
            ticket_id: self.id,
            status: self.status,
            action,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Currency;

    fn ticket() -> BookingTicket {
        BookingTicket::new(SeatNumber::new("A1"), Money::new(45_000, Currency::IDR))
    }

    #[test]
    fn test_issue_then_use() {
        let now = Utc::now();
        let mut ticket = ticket();
        ticket
            .issue("TKT-1".to_string(), ArtifactRef::new("qr/1.png"), now)
            .unwrap();
        assert_eq!(ticket.status(), TicketStatus::Issued);
        assert_eq!(ticket.ticket_code(), Some("TKT-1"));
        assert_eq!(ticket.issued_at(), Some(now));

        ticket.mark_used(now).unwrap();
        assert_eq!(ticket.status(), TicketStatus::Used);
        assert_eq!(ticket.used_at(), Some(now));
    }

    #[test]
    fn test_issue_twice_fails() {
        let now = Utc::now();
        let mut ticket = ticket();
        ticket.issue("TKT-1".to_string(), ArtifactRef::new("a"), now).unwrap();
        let err = ticket
            .issue("TKT-2".to_string(), ArtifactRef::new("b"), now)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::TicketInvalidStatus {
                status: TicketStatus::Issued,
                ..
            }
        ));
        assert_eq!(ticket.ticket_code(), Some("TKT-1"));
    }

    #[test]
    fn test_use_errors() {
        let now = Utc::now();
        let mut pending = ticket();
        assert!(matches!(
            pending.mark_used(now),
            Err(DomainError::TicketInvalidStatus { .. })
        ));

        let mut used = ticket();
        used.issue("TKT".to_string(), ArtifactRef::new("a"), now).unwrap();
        used.mark_used(now).unwrap();
        assert_eq!(
            used.mark_used(now),
            Err(DomainError::TicketAlreadyUsed { ticket_id: used.id() })
        );
    }

    #[test]
    fn test_cancel_only_from_live_states() {
        let now = Utc::now();
        let mut ticket = ticket();
        ticket.cancel().unwrap();
        assert_eq!(ticket.status(), TicketStatus::Cancelled);
        assert!(ticket.cancel().is_err());

        let mut used = BookingTicket::new(SeatNumber::new("A2"), Money::zero(Currency::IDR));
        used.issue("TKT".to_string(), ArtifactRef::new("a"), now).unwrap();
        used.mark_used(now).unwrap();
        assert!(used.cancel().is_err());
    }
}
