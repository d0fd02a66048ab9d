//! Business metrics for the venue engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `venue_reservation_transitions_total{to}` - Reservation status changes by target status
//! - `venue_capacity_rejections_total` - Seat requests refused because the event was full
//! - `venue_options_expired_total` - Options cancelled by the expiry sweep
//! - `venue_sweep_failures_total` - Sweep items that failed and were skipped
//! - `venue_notifications_failed_total{kind}` - Undelivered notifications
//! - `venue_archives_total` - Archive records written
//! - `venue_waitlist_promotions_total` - Waitlist candidates surfaced
//!
//! Recording is a no-op until a recorder is installed through
//! `venue_ops_runtime::metrics::MetricsServer`.

use crate::aggregates::ChangeLog;
use crate::expiry::ExpiryReport;
use metrics::describe_counter;

/// Register all business metric descriptions.
///
/// Pass to `MetricsServer::start` so descriptions land on the installed recorder.
pub fn register_venue_metrics() {
    // Reservation metrics
    describe_counter!(
        "venue_reservation_transitions_total",
        "Reservation status changes, labelled by target status"
    );
    describe_counter!(
        "venue_capacity_rejections_total",
        "Seat requests refused because the event was full"
    );
    describe_counter!("venue_archives_total", "Archive records written");

    // Sweep metrics
    describe_counter!(
        "venue_options_expired_total",
        "Options cancelled by the expiry sweep"
    );
    describe_counter!(
        "venue_sweep_failures_total",
        "Sweep items that failed and were skipped"
    );

    // Waitlist and notification metrics
    describe_counter!(
        "venue_waitlist_promotions_total",
        "Waitlist candidates surfaced after seats were released"
    );
    describe_counter!(
        "venue_notifications_failed_total",
        "Notifications that could not be delivered, labelled by kind"
    );

    tracing::info!("Venue metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the transitions, archive and promotions of a committed change log.
pub fn record_changes(changes: &ChangeLog) {
    for transition in &changes.transitions {
        metrics::counter!(
            "venue_reservation_transitions_total",
            "to" => transition.to.as_str()
        )
        .increment(1);
    }
    if changes.archive.is_some() {
        metrics::counter!("venue_archives_total").increment(1);
    }
    if !changes.promotions.is_empty() {
        metrics::counter!("venue_waitlist_promotions_total").increment(changes.promotions.len() as u64);
    }
}

/// Record a seat request refused for lack of capacity.
pub fn record_capacity_rejection() {
    metrics::counter!("venue_capacity_rejections_total").increment(1);
    tracing::debug!("Recorded capacity_rejection metric");
}

/// Record the outcome of one sweep.
pub fn record_sweep(report: &ExpiryReport) {
    metrics::counter!("venue_options_expired_total").increment(report.cancelled_count as u64);
    metrics::counter!("venue_sweep_failures_total").increment(report.failures.len() as u64);
    tracing::debug!(
        cancelled = report.cancelled_count,
        failed = report.failures.len(),
        "Recorded sweep metrics"
    );
}
