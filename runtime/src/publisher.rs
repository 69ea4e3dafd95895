//! Event publisher adapters and the post-commit publish helper.

use crate::metrics;
use cinema_booking_core::BookingId;
use cinema_booking_core::events::BookingEvent;
use cinema_booking_core::publisher::{EventPublisher, PublishError};
use tokio::sync::mpsc;

/// Publish a committed event, logging instead of failing.
///
/// The commit that produced the event has already happened, so a publish
/// failure is recorded and swallowed.
pub async fn publish_committed<P: EventPublisher>(publisher: &P, event: BookingEvent) {
    let event_type = event.event_type();
    let booking_id = event.booking_id();
    if let Err(e) = publisher.publish(event).await {
        tracing::warn!(%booking_id, event_type, error = %e, "Failed to publish event after commit");
        metrics::record_publish_failure(event_type);
    }
}

/// Publisher that writes every event to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: BookingEvent) -> Result<(), PublishError> {
        tracing::info!(
            booking_id = %event.booking_id(),
            event_type = event.event_type(),
            occurred_at = %event.occurred_at(),
            "Booking event"
        );
        Ok(())
    }
}

/// Publisher that forwards confirmed bookings to the fulfillment queue.
///
/// Every event goes to `inner`; `BookingConfirmed` additionally enqueues the
/// booking id. A full queue is not an error: the fulfillment worker's
/// periodic poll picks the booking up.
#[derive(Clone, Debug)]
pub struct QueuePublisher<P> {
    inner: P,
    confirmed: mpsc::Sender<BookingId>,
}

impl<P> QueuePublisher<P> {
    /// Wrap `inner`, enqueueing confirmed bookings on `confirmed`.
    #[must_use]
    pub const fn new(inner: P, confirmed: mpsc::Sender<BookingId>) -> Self {
        Self { inner, confirmed }
    }
}

impl<P: EventPublisher> EventPublisher for QueuePublisher<P> {
    async fn publish(&self, event: BookingEvent) -> Result<(), PublishError> {
        let enqueue = match &event {
            BookingEvent::BookingConfirmed { booking_id, .. } => Some(*booking_id),
            _ => None,
        };
        self.inner.publish(event).await?;

        if let Some(booking_id) = enqueue {
            match self.confirmed.try_send(booking_id) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(
                        %booking_id,
                        "Fulfillment queue full; leaving booking to the poller"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(PublishError::Closed),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cinema_booking_core::{CustomerId, ShowtimeId};

    fn confirmed(booking_id: BookingId) -> BookingEvent {
        BookingEvent::BookingConfirmed {
            booking_id,
            customer_id: CustomerId::new(),
            showtime_id: ShowtimeId::new(),
            seats: vec![],
            reference_id: "pay_1".to_string(),
            paid_at: Utc::now(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_queue_publisher_enqueues_confirmed_only() {
        let (tx, mut rx) = mpsc::channel(4);
        let publisher = QueuePublisher::new(TracingPublisher, tx);
        let booking_id = BookingId::new();

        publisher
            .publish(BookingEvent::BookingCheckedIn {
                booking_id: BookingId::new(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
        publisher.publish(confirmed(booking_id)).await.unwrap();

        assert_eq!(rx.recv().await, Some(booking_id));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queue_publisher_tolerates_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let publisher = QueuePublisher::new(TracingPublisher, tx);

        publisher.publish(confirmed(BookingId::new())).await.unwrap();
        publisher.publish(confirmed(BookingId::new())).await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_publisher_reports_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let publisher = QueuePublisher::new(TracingPublisher, tx);

        assert_eq!(
            publisher.publish(confirmed(BookingId::new())).await,
            Err(PublishError::Closed)
        );
    }
}
