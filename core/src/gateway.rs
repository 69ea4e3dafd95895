//! Payment gateway port.

use crate::types::{BookingId, CustomerId, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the payment gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network or upstream failure worth retrying
    #[error("Payment gateway unavailable: {0}")]
    Transient(String),

    /// Request refused by the gateway
    #[error("Payment request rejected: {0}")]
    Rejected(String),

    /// Callback payload could not be understood
    #[error("Invalid callback payload: {0}")]
    InvalidPayload(String),
}

impl GatewayError {
    /// Checks if the call may succeed when retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Payment request sent to the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Booking being paid
    pub booking_id: BookingId,
    /// Payer
    pub customer_id: CustomerId,
    /// Amount due
    pub amount: Money,
    /// Human-readable description
    pub description: String,
    /// Gateway must refuse payment after this time
    pub expires_at: DateTime<Utc>,
}

/// Payment request created by the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Gateway reference id
    pub reference_id: String,
    /// Checkout URL
    pub payment_url: String,
    /// Expiry reported by the gateway
    pub expires_at: DateTime<Utc>,
}

/// Outcome reported by a callback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    /// Payment captured
    Paid,
    /// Payment declined or errored
    Failed,
    /// Payment request lapsed unpaid
    Expired,
}

impl CallbackStatus {
    /// Stable label for logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

/// Parsed payment callback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCallback {
    /// Gateway reference id
    pub reference_id: String,
    /// Outcome
    pub status: CallbackStatus,
    /// Payment method (card, e-wallet, ...)
    pub method: Option<String>,
    /// Capture time, for paid callbacks
    pub paid_at: Option<DateTime<Utc>>,
}

/// External payment gateway
pub trait PaymentGateway: Send + Sync {
    /// Create a payment request.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Transient`] on network failure
    /// - [`GatewayError::Rejected`] if the gateway refuses the request
    fn create_payment_request(
        &self,
        request: &PaymentRequest,
    ) -> impl std::future::Future<Output = Result<PaymentSession, GatewayError>> + Send;

    /// Parse and authenticate a raw callback body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPayload`] if the body is malformed.
    fn parse_callback(&self, payload: &[u8]) -> Result<PaymentCallback, GatewayError>;
}
