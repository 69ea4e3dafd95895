//! Cinema booking background worker.
//!
//! Expires lapsed seat holds and fulfills confirmed bookings until stopped.

use anyhow::Context;
use cinema_booking_core::environment::SystemClock;
use cinema_booking_postgres::PostgresBookingRepository;
use cinema_booking_runtime::metrics::MetricsServer;
use cinema_booking_worker::{Application, Config, FileArtifactGenerator};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cinema_booking=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        sweeper_interval_secs = config.sweeper.interval.as_secs(),
        fulfillment_poll_secs = config.fulfillment.poll_interval.as_secs(),
        artifact_dir = %config.artifact_dir.display(),
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics.addr()?);
    metrics.start().context("Failed to start metrics exporter")?;

    info!("Connecting to database...");
    let repository =
        PostgresBookingRepository::connect(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to database")?;
    repository.migrate().await.context("Failed to run migrations")?;
    info!("Database ready");

    let artifacts = FileArtifactGenerator::new(config.artifact_dir.clone());
    Application::new(&config, repository, artifacts, SystemClock).run().await;
    Ok(())
}
