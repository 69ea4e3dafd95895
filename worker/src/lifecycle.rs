//! Worker lifecycle and graceful shutdown.
//!
//! [`Application::run_until`] spawns the expiration sweeper and the
//! fulfillment worker, waits for the shutdown future, then broadcasts
//! shutdown and gives each task `shutdown_timeout` to finish its current
//! pass.

use crate::config::Config;
use cinema_booking_core::BookingId;
use cinema_booking_core::artifacts::TicketArtifactGenerator;
use cinema_booking_core::environment::Clock;
use cinema_booking_core::store::BookingRepository;
use cinema_booking_runtime::{
    ExpirationSweeper, FulfillmentWorker, QueuePublisher, TracingPublisher,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Publisher used by the worker's loops
pub type WorkerPublisher = QueuePublisher<TracingPublisher>;

/// Configured background tasks, ready to run
pub struct Application<R, A, K> {
    sweeper: Arc<ExpirationSweeper<R, WorkerPublisher, K>>,
    fulfillment: Arc<FulfillmentWorker<R, A, WorkerPublisher, K>>,
    publisher: WorkerPublisher,
    queue_rx: mpsc::Receiver<BookingId>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: Duration,
}

impl<R, A, K> Application<R, A, K>
where
    R: BookingRepository + Clone + 'static,
    A: TicketArtifactGenerator + 'static,
    K: Clock + Clone + 'static,
{
    /// Wire the sweeper and fulfillment worker over `repository`.
    #[must_use]
    pub fn new(config: &Config, repository: R, artifacts: A, clock: K) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.fulfillment_queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);
        let publisher = QueuePublisher::new(TracingPublisher, queue_tx);

        let sweeper = ExpirationSweeper::new(
            repository.clone(),
            publisher.clone(),
            clock.clone(),
            config.booking.conflict_retry.clone(),
            config.sweeper.clone(),
        );
        let fulfillment = FulfillmentWorker::new(
            repository,
            artifacts,
            publisher.clone(),
            clock,
            config.fulfillment.clone(),
        );

        Self {
            sweeper: Arc::new(sweeper),
            fulfillment: Arc::new(fulfillment),
            publisher,
            queue_rx,
            shutdown_tx,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Publisher that feeds confirmed bookings to this worker's fulfillment queue.
    ///
    /// Hand it to a booking service running in the same process so
    /// confirmations are fulfilled without waiting for the next poll.
    #[must_use]
    pub fn publisher(&self) -> WorkerPublisher {
        self.publisher.clone()
    }

    /// Run both loops until Ctrl+C or SIGTERM.
    pub async fn run(self) {
        self.run_until(shutdown_signal()).await;
    }

    /// Run both loops until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        let Self {
            sweeper,
            fulfillment,
            publisher: _,
            queue_rx,
            shutdown_tx,
            shutdown_timeout,
        } = self;

        info!("Starting expiration sweeper and fulfillment worker");
        let sweeper_rx = shutdown_tx.subscribe();
        let fulfillment_rx = shutdown_tx.subscribe();
        let handles = [
            (
                "sweeper",
                tokio::spawn(async move { sweeper.run(sweeper_rx).await }),
            ),
            (
                "fulfillment",
                tokio::spawn(async move { fulfillment.run(queue_rx, fulfillment_rx).await }),
            ),
        ];

        shutdown.await;
        info!("Shutdown requested, stopping background tasks");
        let _ = shutdown_tx.send(());

        await_shutdown(handles, shutdown_timeout).await;
        info!("Graceful shutdown complete");
    }
}

async fn await_shutdown(handles: [(&'static str, JoinHandle<()>); 2], timeout: Duration) {
    for (task, handle) in handles {
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => info!(task, "Task stopped gracefully"),
            Ok(Err(e)) => warn!(task, error = %e, "Task failed"),
            Err(_) => warn!(task, "Task shutdown timed out"),
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed, that signal is logged and ignored.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
