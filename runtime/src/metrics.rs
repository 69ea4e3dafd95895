//! Prometheus metrics for the booking runtime.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `booking_bookings_total{status}` - Booking transitions (created, confirmed, cancelled,
//!   expired, checked_in)
//! - `booking_hold_conflicts_total` - Create attempts rejected because seats were taken
//! - `booking_concurrency_conflicts_total{operation}` - Optimistic-concurrency conflicts
//! - `booking_payments_total{outcome}` - Payment callbacks by outcome
//! - `booking_seats_released_total{source}` - Seats returned to the pool
//! - `booking_tickets_issued_total` - Tickets issued by fulfillment
//! - `booking_sweep_runs_total` / `booking_sweep_failures_total`
//! - `booking_retries_total{operation}` / `booking_retries_exhausted_total{operation}`
//! - `booking_publish_failures_total{event_type}`
//!
//! ## Histograms
//! - `booking_sweep_duration_seconds` - Time for one sweep pass
//! - `booking_fulfillment_duration_seconds` - Time to fulfill one booking
//!
//! # Example
//!
//! ```rust,no_run
//! use cinema_booking_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Installs the global recorder and serves `/metrics` over HTTP. Must be
/// started from inside a tokio runtime.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and spawn the HTTP exporter.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or a recorder
    /// is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| MetricsError::Install(e.to_string()))?;

        let addr = self.addr;
        tokio::spawn(async move {
            // ExporterError carries no printable detail
            if exporter.await.is_err() {
                tracing::error!(%addr, "Metrics exporter stopped");
            }
        });

        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        self.handle = Some(handle);
        Ok(())
    }

    /// Address the exporter listens on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
///
/// Called by [`MetricsServer::start`]; safe to call more than once.
pub fn register_metrics() {
    describe_counter!(
        "booking_bookings_total",
        "Booking transitions by status (created, confirmed, cancelled, expired, checked_in)"
    );
    describe_counter!(
        "booking_hold_conflicts_total",
        "Create-booking attempts rejected because a requested seat was taken"
    );
    describe_counter!(
        "booking_concurrency_conflicts_total",
        "Optimistic-concurrency conflicts by operation"
    );
    describe_counter!("booking_payments_total", "Payment callbacks by outcome");
    describe_counter!("booking_seats_released_total", "Seats returned to the pool by source");
    describe_counter!("booking_tickets_issued_total", "Tickets issued by fulfillment");
    describe_counter!("booking_sweep_runs_total", "Expiration sweep passes");
    describe_counter!(
        "booking_sweep_failures_total",
        "Bookings the sweeper failed to process"
    );
    describe_counter!("booking_retries_total", "Retried operations by label");
    describe_counter!(
        "booking_retries_exhausted_total",
        "Operations that failed after exhausting their retry policy"
    );
    describe_counter!(
        "booking_publish_failures_total",
        "Events that could not be published after commit"
    );
    describe_histogram!("booking_sweep_duration_seconds", "Time for one sweep pass");
    describe_histogram!(
        "booking_fulfillment_duration_seconds",
        "Time to issue tickets and invoice for one booking"
    );
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a booking transition.
pub fn record_booking(status: &'static str) {
    metrics::counter!("booking_bookings_total", "status" => status).increment(1);
}

/// Record a create-booking attempt that lost its seats.
pub fn record_hold_conflict() {
    metrics::counter!("booking_hold_conflicts_total").increment(1);
}

/// Record an optimistic-concurrency conflict.
pub fn record_concurrency_conflict(operation: &'static str) {
    metrics::counter!("booking_concurrency_conflicts_total", "operation" => operation).increment(1);
}

/// Record a handled payment callback.
pub fn record_payment(outcome: &'static str) {
    metrics::counter!("booking_payments_total", "outcome" => outcome).increment(1);
}

/// Record seats released back to the pool.
pub fn record_seats_released(source: &'static str, count: usize) {
    metrics::counter!("booking_seats_released_total", "source" => source).increment(count as u64);
}

/// Record issued tickets.
pub fn record_tickets_issued(count: usize) {
    metrics::counter!("booking_tickets_issued_total").increment(count as u64);
}

/// Record one fulfillment.
pub fn record_fulfillment_duration(duration_secs: f64) {
    metrics::histogram!("booking_fulfillment_duration_seconds").record(duration_secs);
}

/// Record one sweep pass.
pub fn record_sweep(duration_secs: f64, failures: usize) {
    metrics::counter!("booking_sweep_runs_total").increment(1);
    metrics::counter!("booking_sweep_failures_total").increment(failures as u64);
    metrics::histogram!("booking_sweep_duration_seconds").record(duration_secs);
}

/// Record a retry.
pub fn record_retry(operation: &'static str) {
    metrics::counter!("booking_retries_total", "operation" => operation).increment(1);
}

/// Record an operation that exhausted its retry policy.
pub fn record_retries_exhausted(operation: &'static str) {
    metrics::counter!("booking_retries_exhausted_total", "operation" => operation).increment(1);
}

/// Record an event that could not be published.
pub fn record_publish_failure(event_type: &'static str) {
    metrics::counter!("booking_publish_failures_total", "event_type" => event_type).increment(1);
}
