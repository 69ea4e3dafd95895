//! Booking aggregate and its state machine.
//!
//! ```text
//! PENDING_PAYMENT ──► PAYMENT_PROCESSING ──► CONFIRMED ──► CHECKED_IN
//!        │  │                 │                  │
//!        │  └─► EXPIRED       └──► CANCELLED ◄───┘
//!        └────────────────────────► CANCELLED
//! ```
//!
//! Terminal bookings reject every further transition with
//! [`DomainError::BookingAlreadyTerminal`] before any operation-specific check.

use crate::error::DomainError;
use crate::store::Version;
use crate::ticket::{BookingTicket, TicketStatus};
use crate::types::{ArtifactRef, BookingId, CustomerId, Money, SeatNumber, ShowtimeId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::{self, Write as _};

/// Booking lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Seats held, waiting for the customer to pay
    PendingPayment,
    /// Payment request created at the gateway
    PaymentProcessing,
    /// Paid; seats reserved
    Confirmed,
    /// Every ticket scanned
    CheckedIn,
    /// Cancelled by the customer or by a failed payment
    Cancelled,
    /// Hold lapsed before payment started
    Expired,
}

impl BookingStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 6] = [
        Self::PendingPayment,
        Self::PaymentProcessing,
        Self::Confirmed,
        Self::CheckedIn,
        Self::Cancelled,
        Self::Expired,
    ];

    /// Checks if no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::CheckedIn | Self::Cancelled | Self::Expired)
    }

    /// Checks if the state machine has an edge from `self` to `to`
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (
                Self::PendingPayment,
                Self::PaymentProcessing | Self::Cancelled | Self::Expired
            ) | (Self::PaymentProcessing, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::CheckedIn | Self::Cancelled)
        )
    }

    /// Stable label for logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::PaymentProcessing => "PAYMENT_PROCESSING",
            Self::Confirmed => "CONFIRMED",
            Self::CheckedIn => "CHECKED_IN",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state recorded on the booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Gateway reference id
    pub reference_id: String,
    /// Checkout URL handed to the customer
    pub payment_url: String,
    /// Payment method reported by the gateway
    pub method: Option<String>,
    /// When the gateway captured the payment
    pub paid_at: Option<DateTime<Utc>>,
}

/// A customer's booking of one or more seats for a showtime
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    customer_id: CustomerId,
    showtime_id: ShowtimeId,
    tickets: Vec<BookingTicket>,
    status: BookingStatus,
    service_fee: Money,
    total_amount: Money,
    payment: Option<PaymentDetails>,
    invoice_ref: Option<ArtifactRef>,
    qr_seed: Option<String>,
    created_at: DateTime<Utc>,
    hold_expires_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    checked_in_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    version: Version,
}

impl Booking {
    /// Creates a booking awaiting payment.
    ///
    /// The total is the sum of ticket prices plus the service fee.
    ///
    /// # Errors
    ///
    /// - [`DomainError::BookingMinimumSeats`] if `tickets` is empty
    /// - [`DomainError::CurrencyMismatch`] / [`DomainError::AmountOverflow`] if the total
    ///   cannot be computed
    pub fn create(
        id: BookingId,
        customer_id: CustomerId,
        showtime_id: ShowtimeId,
        tickets: Vec<BookingTicket>,
        service_fee: Money,
        now: DateTime<Utc>,
        hold_expires_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if tickets.is_empty() {
            return Err(DomainError::BookingMinimumSeats);
        }

        let total_amount = tickets
            .iter()
            .try_fold(service_fee, |total, ticket| total.checked_add(ticket.price()))?;

        Ok(Self {
            id,
            customer_id,
            showtime_id,
            tickets,
            status: BookingStatus::PendingPayment,
            service_fee,
            total_amount,
            payment: None,
            invoice_ref: None,
            qr_seed: None,
            created_at: now,
            hold_expires_at,
            confirmed_at: None,
            cancelled_at: None,
            checked_in_at: None,
            version: Version::initial(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Booking id
    #[must_use]
    pub const fn id(&self) -> BookingId {
        self.id
    }

    /// Customer who owns the booking
    #[must_use]
    pub const fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Showtime booked
    #[must_use]
    pub const fn showtime_id(&self) -> ShowtimeId {
        self.showtime_id
    }

    /// Tickets in seat order of the original request
    #[must_use]
    pub fn tickets(&self) -> &[BookingTicket] {
        &self.tickets
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> BookingStatus {
        self.status
    }

    /// Service fee
    #[must_use]
    pub const fn service_fee(&self) -> Money {
        self.service_fee
    }

    /// Ticket prices plus service fee
    #[must_use]
    pub const fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Payment details, once payment was initiated
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentDetails> {
        self.payment.as_ref()
    }

    /// Gateway reference id, once payment was initiated
    #[must_use]
    pub fn payment_reference(&self) -> Option<&str> {
        self.payment.as_ref().map(|p| p.reference_id.as_str())
    }

    /// Invoice artifact, once attached
    #[must_use]
    pub const fn invoice_ref(&self) -> Option<&ArtifactRef> {
        self.invoice_ref.as_ref()
    }

    /// Hex SHA-256 seed for QR rendering, set on confirmation
    #[must_use]
    pub fn qr_seed(&self) -> Option<&str> {
        self.qr_seed.as_deref()
    }

    /// Creation time
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Deadline shared with the seat holds
    #[must_use]
    pub const fn hold_expires_at(&self) -> DateTime<Utc> {
        self.hold_expires_at
    }

    /// Confirmation time
    #[must_use]
    pub const fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    /// Cancellation time
    #[must_use]
    pub const fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// Check-in time
    #[must_use]
    pub const fn checked_in_at(&self) -> Option<DateTime<Utc>> {
        self.checked_in_at
    }

    /// Version loaded from the store (`0` if never persisted)
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Sets the version after a load or a successful save.
    ///
    /// Only store implementations should call this.
    pub const fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Seat numbers of every ticket
    #[must_use]
    pub fn seat_numbers(&self) -> Vec<SeatNumber> {
        self.tickets.iter().map(|t| t.seat_number().clone()).collect()
    }

    /// Ticket for a seat
    #[must_use]
    pub fn ticket_for(&self, seat: &SeatNumber) -> Option<&BookingTicket> {
        self.tickets.iter().find(|t| t.seat_number() == seat)
    }

    /// Checks if `customer_id` owns the booking
    #[must_use]
    pub fn is_owned_by(&self, customer_id: CustomerId) -> bool {
        self.customer_id == customer_id
    }

    /// Checks if the booking still awaits payment past its deadline.
    ///
    /// The hold is still valid at exactly `hold_expires_at`.
    #[must_use]
    pub fn is_hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::PendingPayment && now > self.hold_expires_at
    }

    /// Checks if every live ticket is issued and the invoice is attached
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.invoice_ref.is_some()
            && self
                .tickets
                .iter()
                .all(|t| t.status() != TicketStatus::Pending)
    }

    /// Code printed on the ticket for `seat`
    #[must_use]
    pub fn ticket_code_for(&self, seat: &SeatNumber) -> String {
        ticket_code(self.id, seat)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Records the gateway payment request.
    ///
    /// # Errors
    ///
    /// Fails unless the booking is `PENDING_PAYMENT`.
    pub fn initiate_payment(
        &mut self,
        reference_id: String,
        payment_url: String,
    ) -> Result<(), DomainError> {
        self.ensure_transition(BookingStatus::PaymentProcessing)?;
        self.payment = Some(PaymentDetails {
            reference_id,
            payment_url,
            method: None,
            paid_at: None,
        });
        self.status = BookingStatus::PaymentProcessing;
        Ok(())
    }

    /// Confirms a captured payment and derives the QR seed.
    ///
    /// # Errors
    ///
    /// - [`DomainError::BookingAlreadyTerminal`] if the booking is terminal
    /// - [`DomainError::PaymentNotInitiated`] if no payment request was recorded
    /// - [`DomainError::InvalidBookingTransition`] unless `PAYMENT_PROCESSING`
    pub fn confirm_payment(
        &mut self,
        method: Option<String>,
        paid_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_not_terminal()?;
        if self.payment.is_none() {
            return Err(DomainError::PaymentNotInitiated);
        }
        self.ensure_transition(BookingStatus::Confirmed)?;

        let seed = self.derive_qr_seed(now);
        if let Some(payment) = self.payment.as_mut() {
            payment.method = method;
            payment.paid_at = Some(paid_at);
        }
        self.qr_seed = Some(seed);
        self.confirmed_at = Some(now);
        self.status = BookingStatus::Confirmed;
        Ok(())
    }

    /// Issues every pending ticket with its QR artifact.
    ///
    /// Tickets already issued are skipped. Returns the number issued.
    ///
    /// # Errors
    ///
    /// - [`DomainError::TicketGenerationNotAllowed`] unless `CONFIRMED`
    /// - [`DomainError::TicketArtifactMissing`] if a pending ticket has no entry in `qr_refs`
    pub fn issue_tickets(
        &mut self,
        qr_refs: &HashMap<SeatNumber, ArtifactRef>,
        now: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        if self.status != BookingStatus::Confirmed {
            return Err(DomainError::TicketGenerationNotAllowed { status: self.status });
        }
        if let Some(missing) = self
            .pending_tickets()
            .find(|t| !qr_refs.contains_key(t.seat_number()))
        {
            return Err(DomainError::TicketArtifactMissing {
                seat: missing.seat_number().clone(),
            });
        }

        let booking_id = self.id;
        let mut issued = 0;
        for ticket in &mut self.tickets {
            if ticket.status() != TicketStatus::Pending {
                continue;
            }
            if let Some(qr_ref) = qr_refs.get(ticket.seat_number()) {
                ticket.issue(ticket_code(booking_id, ticket.seat_number()), qr_ref.clone(), now)?;
                issued += 1;
            }
        }
        Ok(issued)
    }

    /// Attaches the invoice artifact.
    ///
    /// # Errors
    ///
    /// - [`DomainError::BookingNotConfirmed`] unless `CONFIRMED`
    /// - [`DomainError::TicketAlreadyGenerated`] if an invoice is attached
    pub fn attach_invoice(&mut self, invoice_ref: ArtifactRef) -> Result<(), DomainError> {
        if self.status != BookingStatus::Confirmed {
            return Err(DomainError::BookingNotConfirmed { status: self.status });
        }
        if self.invoice_ref.is_some() {
            return Err(DomainError::TicketAlreadyGenerated);
        }
        self.invoice_ref = Some(invoice_ref);
        Ok(())
    }

    /// Checks in the whole booking, marking every issued ticket used.
    ///
    /// # Errors
    ///
    /// - [`DomainError::BookingAlreadyTerminal`] if the booking is terminal
    /// - [`DomainError::BookingNotConfirmed`] unless `CONFIRMED`
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_not_terminal()?;
        if self.status != BookingStatus::Confirmed {
            return Err(DomainError::BookingNotConfirmed { status: self.status });
        }
        for ticket in &mut self.tickets {
            if ticket.status() == TicketStatus::Issued {
                ticket.mark_used(now)?;
            }
        }
        self.status = BookingStatus::CheckedIn;
        self.checked_in_at = Some(now);
        Ok(())
    }

    /// Checks in one seat. The booking becomes `CHECKED_IN` once every ticket is used.
    ///
    /// Returns the id of the scanned ticket.
    ///
    /// # Errors
    ///
    /// - [`DomainError::BookingNotConfirmed`] unless `CONFIRMED` or `CHECKED_IN`
    /// - [`DomainError::TicketNotFound`] if no ticket is for `seat`
    /// - [`DomainError::TicketAlreadyUsed`] / [`DomainError::TicketInvalidStatus`] from the ticket
    pub fn check_in_ticket(
        &mut self,
        seat: &SeatNumber,
        now: DateTime<Utc>,
    ) -> Result<TicketId, DomainError> {
        if !matches!(self.status, BookingStatus::Confirmed | BookingStatus::CheckedIn) {
            return Err(DomainError::BookingNotConfirmed { status: self.status });
        }
        let ticket = self
            .tickets
            .iter_mut()
            .find(|t| t.seat_number() == seat)
            .ok_or_else(|| DomainError::TicketNotFound { seat: seat.clone() })?;
        ticket.mark_used(now)?;
        let ticket_id = ticket.id();

        if self.status == BookingStatus::Confirmed
            && self.tickets.iter().all(|t| t.status() == TicketStatus::Used)
        {
            self.status = BookingStatus::CheckedIn;
            self.checked_in_at = Some(now);
        }
        Ok(ticket_id)
    }

    /// Cancels the booking and voids every unused ticket.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::BookingAlreadyTerminal`] if the booking is terminal.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_transition(BookingStatus::Cancelled)?;
        for ticket in &mut self.tickets {
            if matches!(ticket.status(), TicketStatus::Pending | TicketStatus::Issued) {
                ticket.cancel()?;
            }
        }
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(())
    }

    /// Expires a booking whose hold lapsed before payment started.
    ///
    /// # Errors
    ///
    /// - [`DomainError::BookingAlreadyTerminal`] if the booking is terminal
    /// - [`DomainError::BookingCannotExpire`] unless `PENDING_PAYMENT`
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_not_terminal()?;
        if self.status != BookingStatus::PendingPayment {
            return Err(DomainError::BookingCannotExpire { status: self.status });
        }
        for ticket in &mut self.tickets {
            if ticket.status() == TicketStatus::Pending {
                ticket.cancel()?;
            }
        }
        self.status = BookingStatus::Expired;
        self.cancelled_at = Some(now);
        Ok(())
    }

    fn pending_tickets(&self) -> impl Iterator<Item = &BookingTicket> {
        self.tickets
            .iter()
            .filter(|t| t.status() == TicketStatus::Pending)
    }

    const fn ensure_not_terminal(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::BookingAlreadyTerminal { status: self.status });
        }
        Ok(())
    }

    const fn ensure_transition(&self, to: BookingStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::BookingAlreadyTerminal { status: self.status });
        }
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidBookingTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn derive_qr_seed(&self, now: DateTime<Utc>) -> String {
        let input = format!(
            "{}:{}:{}:{}",
            self.id,
            self.customer_id,
            self.showtime_id,
            now.to_rfc3339()
        );
        Sha256::digest(input.as_bytes())
            .iter()
            .fold(String::with_capacity(64), |mut hex, byte| {
                let _ = write!(hex, "{byte:02x}");
                hex
            })
    }
}

fn ticket_code(booking_id: BookingId, seat: &SeatNumber) -> String {
    format!("TKT-{}-{}", booking_id.short_code(), seat.normalized())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Currency;
    use chrono::Duration;

    fn price() -> Money {
        Money::new(45_000, Currency::IDR)
    }

    fn booking(seats: &[&str]) -> Booking {
        let now = Utc::now();
        let tickets = seats
            .iter()
            .map(|s| BookingTicket::new(SeatNumber::new(*s), price()))
            .collect();
        Booking::create(
            BookingId::new(),
            CustomerId::new(),
            ShowtimeId::new(),
            tickets,
            Money::new(5_000, Currency::IDR),
            now,
            now + Duration::minutes(15),
        )
        .unwrap()
    }

    fn confirmed(seats: &[&str]) -> Booking {
        let now = Utc::now();
        let mut booking = booking(seats);
        booking
            .initiate_payment("pay_1".to_string(), "https://pay/1".to_string())
            .unwrap();
        booking
            .confirm_payment(Some("QRIS".to_string()), now, now)
            .unwrap();
        booking
    }

    fn qr_refs(seats: &[&str]) -> HashMap<SeatNumber, ArtifactRef> {
        seats
            .iter()
            .map(|s| (SeatNumber::new(*s), ArtifactRef::new(format!("qr/{s}.png"))))
            .collect()
    }

    #[test]
    fn test_create_computes_total() {
        let booking = booking(&["A1", "A2"]);
        assert_eq!(booking.status(), BookingStatus::PendingPayment);
        assert_eq!(booking.total_amount(), Money::new(95_000, Currency::IDR));
        assert_eq!(booking.tickets().len(), 2);
    }

    #[test]
    fn test_create_requires_tickets() {
        let now = Utc::now();
        let result = Booking::create(
            BookingId::new(),
            CustomerId::new(),
            ShowtimeId::new(),
            Vec::new(),
            Money::zero(Currency::IDR),
            now,
            now,
        );
        assert_eq!(result.unwrap_err(), DomainError::BookingMinimumSeats);
    }

    #[test]
    fn test_create_rejects_mixed_currencies() {
        let now = Utc::now();
        let tickets = vec![BookingTicket::new(
            SeatNumber::new("A1"),
            Money::new(10, Currency::USD),
        )];
        let result = Booking::create(
            BookingId::new(),
            CustomerId::new(),
            ShowtimeId::new(),
            tickets,
            Money::new(5, Currency::IDR),
            now,
            now,
        );
        assert!(matches!(result, Err(DomainError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_confirm_sets_seed_and_payment() {
        let booking = confirmed(&["A1"]);
        assert_eq!(booking.status(), BookingStatus::Confirmed);
        assert!(booking.confirmed_at().is_some());
        let seed = booking.qr_seed().unwrap();
        assert_eq!(seed.len(), 64);
        assert!(seed.chars().all(|c| c.is_ascii_hexdigit()));
        let payment = booking.payment().unwrap();
        assert_eq!(payment.method.as_deref(), Some("QRIS"));
        assert!(payment.paid_at.is_some());
    }

    #[test]
    fn test_issue_tickets_builds_codes() {
        let mut booking = confirmed(&["a-1", "B12"]);
        let refs = qr_refs(&["a-1", "B12"]);

        let issued = booking.issue_tickets(&refs, Utc::now()).unwrap();

        assert_eq!(issued, 2);
        let short = booking.id().short_code();
        let codes: Vec<_> = booking.tickets().iter().map(|t| t.ticket_code().unwrap()).collect();
        assert_eq!(codes, vec![format!("TKT-{short}-A1"), format!("TKT-{short}-B12")]);
        assert_eq!(booking.ticket_code_for(&SeatNumber::new("B12")), codes[1]);

        // Re-delivery issues nothing new
        assert_eq!(booking.issue_tickets(&refs, Utc::now()).unwrap(), 0);
    }

    #[test]
    fn test_issue_tickets_validates_all_refs_first() {
        let mut booking = confirmed(&["A1", "A2"]);
        let before = booking.clone();

        let err = booking.issue_tickets(&qr_refs(&["A1"]), Utc::now()).unwrap_err();

        assert_eq!(err, DomainError::TicketArtifactMissing { seat: SeatNumber::new("A2") });
        assert_eq!(booking, before);
    }

    #[test]
    fn test_issue_tickets_requires_confirmed() {
        let mut booking = booking(&["A1"]);
        let err = booking.issue_tickets(&qr_refs(&["A1"]), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::TicketGenerationNotAllowed {
                status: BookingStatus::PendingPayment
            }
        );
    }

    #[test]
    fn test_attach_invoice_once() {
        let mut booking = confirmed(&["A1"]);
        booking.attach_invoice(ArtifactRef::new("inv.pdf")).unwrap();
        assert_eq!(
            booking.attach_invoice(ArtifactRef::new("inv2.pdf")),
            Err(DomainError::TicketAlreadyGenerated)
        );
        assert_eq!(booking.invoice_ref().unwrap().as_str(), "inv.pdf");

        let mut pending = self::booking(&["A1"]);
        assert!(matches!(
            pending.attach_invoice(ArtifactRef::new("x")),
            Err(DomainError::BookingNotConfirmed { .. })
        ));
    }

    #[test]
    fn test_fulfilled_after_issue_and_invoice() {
        let mut booking = confirmed(&["A1"]);
        assert!(!booking.is_fulfilled());
        booking.issue_tickets(&qr_refs(&["A1"]), Utc::now()).unwrap();
        assert!(!booking.is_fulfilled());
        booking.attach_invoice(ArtifactRef::new("inv.pdf")).unwrap();
        assert!(booking.is_fulfilled());
    }

    #[test]
    fn test_whole_booking_check_in() {
        let now = Utc::now();
        let mut booking = confirmed(&["A1", "A2"]);
        booking.issue_tickets(&qr_refs(&["A1", "A2"]), now).unwrap();

        booking.check_in(now).unwrap();

        assert_eq!(booking.status(), BookingStatus::CheckedIn);
        assert_eq!(booking.checked_in_at(), Some(now));
        assert!(booking.tickets().iter().all(|t| t.status() == TicketStatus::Used));
    }

    #[test]
    fn test_check_in_ticket_unknown_seat() {
        let mut booking = confirmed(&["A1"]);
        assert_eq!(
            booking.check_in_ticket(&SeatNumber::new("Z9"), Utc::now()),
            Err(DomainError::TicketNotFound { seat: SeatNumber::new("Z9") })
        );
    }

    #[test]
    fn test_cancel_leaves_used_tickets() {
        let now = Utc::now();
        let mut booking = confirmed(&["A1", "A2"]);
        booking.issue_tickets(&qr_refs(&["A1", "A2"]), now).unwrap();
        booking.check_in_ticket(&SeatNumber::new("A1"), now).unwrap();

        booking.cancel(now).unwrap();

        let statuses: Vec<_> = booking.tickets().iter().map(BookingTicket::status).collect();
        assert_eq!(statuses, vec![TicketStatus::Used, TicketStatus::Cancelled]);
        assert_eq!(booking.cancelled_at(), Some(now));
    }

    #[test]
    fn test_expire_only_pending_payment() {
        let now = Utc::now();
        let mut processing = booking(&["A1"]);
        processing
            .initiate_payment("ref".to_string(), "url".to_string())
            .unwrap();
        assert_eq!(
            processing.expire(now),
            Err(DomainError::BookingCannotExpire {
                status: BookingStatus::PaymentProcessing
            })
        );

        let mut pending = booking(&["A1"]);
        pending.expire(now).unwrap();
        assert_eq!(pending.status(), BookingStatus::Expired);
        assert_eq!(pending.tickets()[0].status(), TicketStatus::Cancelled);
    }

    #[test]
    fn test_is_hold_expired_boundary() {
        let booking = booking(&["A1"]);
        let deadline = booking.hold_expires_at();
        assert!(!booking.is_hold_expired(deadline));
        assert!(booking.is_hold_expired(deadline + Duration::milliseconds(1)));
    }

    #[test]
    fn test_transition_table() {
        use BookingStatus::{
            Cancelled, CheckedIn, Confirmed, Expired, PaymentProcessing, PendingPayment,
        };
        assert!(PendingPayment.can_transition_to(PaymentProcessing));
        assert!(PendingPayment.can_transition_to(Expired));
        assert!(!PendingPayment.can_transition_to(Confirmed));
        assert!(PaymentProcessing.can_transition_to(Confirmed));
        assert!(!PaymentProcessing.can_transition_to(Expired));
        assert!(Confirmed.can_transition_to(CheckedIn));
        for terminal in [CheckedIn, Cancelled, Expired] {
            for to in BookingStatus::ALL {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_serde_skips_version() {
        let mut booking = booking(&["A1"]);
        booking.set_version(Version::new(7));
        let json = serde_json::to_value(&booking).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["status"], "PENDING_PAYMENT");

        let back: Booking = serde_json::from_value(json).unwrap();
        assert_eq!(back.version(), Version::initial());
    }
}
