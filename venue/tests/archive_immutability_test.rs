//! Archive records do not change once written.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use std::sync::Arc;
use venue_ops::{
    lifecycle::ReservationStatus, notify::RecordingNotifier, BookingEnvironment,
    InMemoryVenueRepository, Money, VenueError, VenueService,
};
use venue_ops_core::environment::Clock;
use venue_ops_testing::{test_clock, ManualClock};

fn service(clock: &ManualClock) -> VenueService {
    let env = BookingEnvironment::new(Arc::new(clock.clone()), Arc::new(RecordingNotifier::new()), 7);
    VenueService::new(Arc::new(InMemoryVenueRepository::new()), env)
}

#[tokio::test]
async fn test_archive_is_frozen_against_later_changes() {
    let clock = ManualClock::new(test_clock().now());
    let service = service(&clock);
    let show = service
        .create_event("Closing Night", clock.now() + Duration::days(20), 30)
        .await
        .unwrap();
    let res = service
        .submit_request(show.id, "Gwendolen", 2, Money::from_cents(20_000))
        .await
        .unwrap();
    service.confirm(res.id).await.unwrap();
    service
        .record_payment(res.id, Money::from_cents(10_000), "PAY-100")
        .await
        .unwrap();
    service
        .record_payment(res.id, Money::from_cents(5_000), "PAY-101")
        .await
        .unwrap();
    service
        .record_refund(res.id, Money::from_cents(3_000), "REF-200")
        .await
        .unwrap();

    let record = service.archive(res.id, "box office", "event closed").await.unwrap();

    let financials = *record.financials();
    assert_eq!(financials.total_paid, Money::from_cents(15_000));
    assert_eq!(financials.total_refunded, Money::from_cents(3_000));
    assert_eq!(financials.net_revenue, Money::from_cents(12_000));
    assert!(financials.has_refunds);
    assert!(!financials.is_fully_refunded);
    assert!(financials.has_outstanding_balance);
    assert_eq!(record.payment_references(), ["PAY-100", "PAY-101"]);
    assert_eq!(record.refund_references(), ["REF-200"]);

    // The live reservation moves on
    clock.advance(Duration::hours(2));
    service
        .record_payment(res.id, Money::from_cents(8_000), "PAY-102")
        .await
        .unwrap();
    let checked_in = service.check_in(res.id).await.unwrap();
    assert_eq!(checked_in.status, ReservationStatus::CheckedIn);

    // The stored record does not
    let stored = service.get_archive(res.id).await.unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(*stored.financials(), financials);
    assert_eq!(stored.snapshot().status, ReservationStatus::Confirmed);
    assert_eq!(stored.payments().len(), 2);
}

#[tokio::test]
async fn test_second_archive_is_refused() {
    let clock = ManualClock::new(test_clock().now());
    let service = service(&clock);
    let show = service
        .create_event("Revival", clock.now() + Duration::days(20), 30)
        .await
        .unwrap();
    let res = service
        .submit_request(show.id, "Jack", 2, Money::from_cents(5_000))
        .await
        .unwrap();

    let first = service.archive(res.id, "ops", "duplicate booking").await.unwrap();
    let err = service.archive(res.id, "ops", "again").await.unwrap_err();

    assert_eq!(err, VenueError::AlreadyArchived { reservation_id: res.id });
    assert_eq!(service.get_archive(res.id).await.unwrap(), Some(first));
    assert_eq!(service.archive_summary().await.unwrap().records, 1);
}
