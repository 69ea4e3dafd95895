//! Shared harness for runtime integration tests.

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::unwrap_used)] // Test code uses unwrap for clarity

use cinema_booking_core::catalog::ShowtimeSeating;
use cinema_booking_core::environment::Clock;
use cinema_booking_core::gateway::CallbackStatus;
use cinema_booking_core::{Booking, CustomerId, SeatNumber};
use cinema_booking_runtime::{
    BookingConfig, BookingService, CreateBookingRequest, ExpirationSweeper, FulfillmentConfig,
    FulfillmentWorker, RetryPolicy, SweeperConfig,
};
use cinema_booking_testing::fixtures::{self, SERVICE_FEE};
use cinema_booking_testing::{
    InMemoryBookingRepository, InMemoryShowtimeCatalog, ManualClock, MockArtifactGenerator,
    MockPaymentGateway, RecordingPublisher,
};
use std::time::Duration;

pub type Service = BookingService<
    InMemoryBookingRepository,
    InMemoryShowtimeCatalog,
    MockPaymentGateway,
    RecordingPublisher,
    ManualClock,
>;

pub type Sweeper = ExpirationSweeper<InMemoryBookingRepository, RecordingPublisher, ManualClock>;

pub type Fulfillment =
    FulfillmentWorker<
        InMemoryBookingRepository,
        MockArtifactGenerator,
        RecordingPublisher,
        ManualClock,
    >;

/// Retry policy with millisecond delays
pub fn fast_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build()
}

pub fn test_config() -> BookingConfig {
    BookingConfig::default()
        .with_hold_duration(fixtures::hold_duration())
        .with_service_fee(SERVICE_FEE)
        .with_conflict_retry(fast_retry(10))
        .with_gateway_retry(fast_retry(3))
        .with_artifact_retry(fast_retry(3))
}

pub struct Harness {
    pub service: Service,
    pub repository: InMemoryBookingRepository,
    pub catalog: InMemoryShowtimeCatalog,
    pub gateway: MockPaymentGateway,
    pub publisher: RecordingPublisher,
    pub clock: ManualClock,
    pub seating: ShowtimeSeating,
    pub customer: CustomerId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: BookingConfig) -> Self {
        cinema_booking_testing::init_test_tracing();

        let repository = InMemoryBookingRepository::new();
        let seating = fixtures::seating(&fixtures::small_auditorium());
        let catalog = InMemoryShowtimeCatalog::with_showtime(seating.clone());
        let gateway = MockPaymentGateway::new();
        let publisher = RecordingPublisher::new();
        let clock = ManualClock::default();
        let service = BookingService::new(
            repository.clone(),
            catalog.clone(),
            gateway.clone(),
            publisher.clone(),
            clock.clone(),
            config,
        );

        Self {
            service,
            repository,
            catalog,
            gateway,
            publisher,
            clock,
            seating,
            customer: CustomerId::new(),
        }
    }

    pub fn request(&self, seats: &[&str]) -> CreateBookingRequest {
        CreateBookingRequest {
            customer_id: self.customer,
            showtime_id: self.seating.showtime_id,
            seats: fixtures::seat_numbers(seats),
        }
    }

    pub fn seat(number: &str) -> SeatNumber {
        SeatNumber::new(number)
    }

    pub async fn create(&self, seats: &[&str]) -> Booking {
        self.service.create_booking(self.request(seats)).await.unwrap()
    }

    /// Create a booking and move it to `PAYMENT_PROCESSING`.
    pub async fn awaiting_payment(&self, seats: &[&str]) -> Booking {
        let booking = self.create(seats).await;
        self.service.initiate_payment(booking.id(), self.customer).await.unwrap()
    }

    pub fn callback(&self, booking: &Booking, status: CallbackStatus) -> Vec<u8> {
        let stored = self.repository.booking(booking.id()).unwrap();
        let reference = stored.payment_reference().unwrap().to_string();
        let paid_at = (status == CallbackStatus::Paid).then(|| self.clock.now());
        MockPaymentGateway::callback_payload(&reference, status, paid_at)
    }

    /// Create, pay for and confirm a booking.
    pub async fn confirmed(&self, seats: &[&str]) -> Booking {
        let booking = self.awaiting_payment(seats).await;
        let payload = self.callback(&booking, CallbackStatus::Paid);
        self.service.handle_payment_callback(&payload).await.unwrap();
        self.repository.booking(booking.id()).unwrap()
    }

    pub fn sweeper(&self, batch_size: usize) -> Sweeper {
        ExpirationSweeper::new(
            self.repository.clone(),
            self.publisher.clone(),
            self.clock.clone(),
            fast_retry(5),
            SweeperConfig {
                interval: Duration::from_millis(10),
                batch_size,
            },
        )
    }

    pub fn fulfillment(&self, artifacts: &MockArtifactGenerator) -> Fulfillment {
        FulfillmentWorker::new(
            self.repository.clone(),
            artifacts.clone(),
            self.publisher.clone(),
            self.clock.clone(),
            FulfillmentConfig {
                poll_interval: Duration::from_millis(10),
                batch_size: 10,
                artifact_retry: fast_retry(3),
                conflict_retry: fast_retry(5),
            },
        )
    }
}
