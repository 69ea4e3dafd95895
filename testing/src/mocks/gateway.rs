//! Mock payment gateway.

use chrono::{DateTime, Utc};
use cinema_booking_core::gateway::{
    CallbackStatus, GatewayError, PaymentCallback, PaymentGateway, PaymentRequest, PaymentSession,
};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    requests: Vec<PaymentRequest>,
    transient_failures: usize,
    reject_with: Option<String>,
    issued: usize,
    gate: Option<Arc<Notify>>,
}

/// Mock payment gateway.
///
/// Hands out sequential references (`pay_1`, `pay_2`, ...) and parses JSON
/// callbacks of the form produced by [`MockPaymentGateway::callback_payload`].
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    state: Arc<Mutex<State>>,
}

impl MockPaymentGateway {
    /// Create a new mock gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` requests with [`GatewayError::Transient`].
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn fail_transiently(&self, count: usize) {
        self.state.lock().unwrap().transient_failures = count;
    }

    /// Reject every request with [`GatewayError::Rejected`].
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn reject_with(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().reject_with = Some(reason.into());
    }

    /// Make every later request wait for a permit on the returned gate.
    ///
    /// Lets a test run other operations while a payment request is in flight.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn hold_requests(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().gate = Some(Arc::clone(&gate));
        gate
    }

    /// Every request received, including failed attempts.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Build a callback body this gateway understands.
    #[must_use]
    pub fn callback_payload(
        reference_id: &str,
        status: CallbackStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Vec<u8> {
        let callback = PaymentCallback {
            reference_id: reference_id.to_string(),
            status,
            method: (status == CallbackStatus::Paid).then(|| "QRIS".to_string()),
            paid_at,
        };
        serde_json::to_vec(&callback).unwrap_or_default()
    }
}

impl PaymentGateway for MockPaymentGateway {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn create_payment_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let gate = self.state.lock().unwrap().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(GatewayError::Transient("connection reset".to_string()));
        }
        if let Some(reason) = &state.reject_with {
            return Err(GatewayError::Rejected(reason.clone()));
        }

        state.issued += 1;
        let reference_id = format!("pay_{}", state.issued);
        Ok(PaymentSession {
            payment_url: format!("https://pay.test/checkout/{reference_id}"),
            reference_id,
            expires_at: request.expires_at,
        })
    }

    fn parse_callback(&self, payload: &[u8]) -> Result<PaymentCallback, GatewayError> {
        serde_json::from_slice(payload).map_err(|e| GatewayError::InvalidPayload(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_round_trip() {
        let gateway = MockPaymentGateway::new();
        let payload = MockPaymentGateway::callback_payload("pay_1", CallbackStatus::Failed, None);

        let callback = gateway.parse_callback(&payload).unwrap();

        assert_eq!(callback.reference_id, "pay_1");
        assert_eq!(callback.status, CallbackStatus::Failed);
        assert!(matches!(
            gateway.parse_callback(b"not json"),
            Err(GatewayError::InvalidPayload(_))
        ));
    }
}
