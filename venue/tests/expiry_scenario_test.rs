//! End-to-end option expiry scenario.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use std::sync::Arc;
use venue_ops::{
    lifecycle::{ReservationStatus, WaitlistStatus},
    notify::{Notification, RecordingNotifier},
    types::CancellationCause,
    BookingEnvironment, InMemoryVenueRepository, Money, VenueError, VenueService,
};
use venue_ops_core::environment::Clock;
use venue_ops_testing::{helpers::init_test_tracing, test_clock, ManualClock};

struct Venue {
    service: VenueService,
    clock: ManualClock,
    notifier: RecordingNotifier,
}

fn venue() -> Venue {
    init_test_tracing();
    let clock = ManualClock::new(test_clock().now());
    let notifier = RecordingNotifier::new();
    let env = BookingEnvironment::new(Arc::new(clock.clone()), Arc::new(notifier.clone()), 7);
    Venue {
        service: VenueService::new(Arc::new(InMemoryVenueRepository::new()), env),
        clock,
        notifier,
    }
}

/// Full house, one lapsed two-person option, a waiting pair.
#[tokio::test]
async fn test_expired_option_frees_seats_for_waitlist() {
    let v = venue();
    let show = v
        .service
        .create_event("Full House", v.clock.now() + Duration::days(30), 10)
        .await
        .unwrap();

    let option = v
        .service
        .submit_request(show.id, "Lady Bracknell", 2, Money::from_units(120))
        .await
        .unwrap();
    let expires_at = v.clock.now() + Duration::hours(1);
    v.service.grant_option(option.id, Some(expires_at)).await.unwrap();

    let rest = v
        .service
        .submit_request(show.id, "Coach Party", 8, Money::from_units(480))
        .await
        .unwrap();
    v.service.confirm(rest.id).await.unwrap();
    assert_eq!(v.service.get_event(show.id).await.unwrap().committed_seats, 10);

    let pair = v.service.join_waitlist(show.id, "The Worthings", 2).await.unwrap();

    // Not yet lapsed
    v.clock.set(expires_at);
    assert_eq!(v.service.start_session().await.unwrap().cancelled_count, 0);

    v.clock.advance(Duration::minutes(1));
    let report = v.service.start_session().await.unwrap();

    assert_eq!(report.cancelled_count, 1);
    assert_eq!(report.details[0].reservation_id, option.id);
    assert_eq!(report.details[0].released_seats, 2);
    assert_eq!(report.promotions.len(), 1);
    assert_eq!(report.promotions[0].id, pair.id);

    let cancelled = v.service.get_reservation(option.id).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    let cancellation = cancelled.cancellation.unwrap();
    assert_eq!(cancellation.cause, CancellationCause::Expired);
    assert_eq!(cancellation.at, v.clock.now());

    assert_eq!(v.service.get_event(show.id).await.unwrap().committed_seats, 8);

    // Surfaced, not converted
    assert_eq!(
        v.service.on_seats_released(show.id, 2).await.unwrap().map(|e| e.status),
        Some(WaitlistStatus::Pending)
    );

    let sent = v.notifier.sent();
    assert!(sent.iter().any(|n| matches!(
        n,
        Notification::OptionExpired { reservation_id, released_seats: 2, .. } if *reservation_id == option.id
    )));
    assert!(sent.iter().any(|n| matches!(
        n,
        Notification::WaitlistSlotAvailable { entry_id, .. } if *entry_id == pair.id
    )));
}

#[tokio::test]
async fn test_confirm_after_lapse_is_refused_then_swept() {
    let v = venue();
    let show = v
        .service
        .create_event("Late Show", v.clock.now() + Duration::days(30), 4)
        .await
        .unwrap();
    let option = v
        .service
        .submit_request(show.id, "Algernon", 4, Money::ZERO)
        .await
        .unwrap();
    v.service.grant_option(option.id, None).await.unwrap();

    v.clock.advance(Duration::days(7) + Duration::seconds(1));

    let err = v.service.confirm(option.id).await.unwrap_err();
    assert!(matches!(err, VenueError::OptionExpired { .. }));
    assert!(err.is_recoverable());

    let report = v.service.start_session().await.unwrap();
    assert_eq!(report.cancelled_count, 1);
    assert_eq!(v.service.committed_seats(show.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_extended_option_survives_the_sweep() {
    let v = venue();
    let show = v
        .service
        .create_event("Encore", v.clock.now() + Duration::days(30), 4)
        .await
        .unwrap();
    let option = v
        .service
        .submit_request(show.id, "Cecily", 2, Money::ZERO)
        .await
        .unwrap();
    v.service.grant_option(option.id, None).await.unwrap();
    v.service.extend_option(option.id, 3).await.unwrap();

    v.clock.advance(Duration::days(8));
    assert_eq!(v.service.start_session().await.unwrap().cancelled_count, 0);

    v.clock.advance(Duration::days(3));
    assert_eq!(v.service.start_session().await.unwrap().cancelled_count, 1);
}

#[tokio::test]
async fn test_sweep_spans_events() {
    let v = venue();
    let mut options = Vec::new();
    for name in ["Monday", "Tuesday", "Wednesday"] {
        let show = v
            .service
            .create_event(name, v.clock.now() + Duration::days(30), 6)
            .await
            .unwrap();
        let res = v
            .service
            .submit_request(show.id, "Regular", 3, Money::ZERO)
            .await
            .unwrap();
        v.service.grant_option(res.id, None).await.unwrap();
        options.push((show.id, res.id));
    }

    v.clock.advance(Duration::days(10));
    let report = v.service.start_session().await.unwrap();

    assert_eq!(report.cancelled_count, 3);
    assert_eq!(report.released_seats(), 9);
    for (event_id, _) in options {
        assert_eq!(v.service.committed_seats(event_id).await.unwrap(), 0);
    }
}
