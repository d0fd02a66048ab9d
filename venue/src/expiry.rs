//! Option expiry processing.
//!
//! The pure selection and reporting helpers live here. The sweep itself,
//! which needs the repository and the writer lanes, is
//! [`VenueService::process_expired_options`](crate::service::VenueService::process_expired_options).

use crate::error::VenueError;
use crate::lifecycle::ReservationStatus;
use crate::types::{EventId, Reservation, ReservationId, WaitlistEntry};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A reservation cancelled by the sweep
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpiredOption {
    /// Reservation cancelled
    pub reservation_id: ReservationId,
    /// Event whose seats were released
    pub event_id: EventId,
    /// Seats returned
    pub released_seats: u32,
}

/// A reservation the sweep could not cancel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepFailure {
    /// Reservation that failed
    pub reservation_id: ReservationId,
    /// Its event
    pub event_id: EventId,
    /// What went wrong
    pub error: VenueError,
}

/// Outcome of one sweep
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpiryReport {
    /// Number of options cancelled
    pub cancelled_count: usize,
    /// One line per cancelled option
    pub details: Vec<ExpiredOption>,
    /// Items that failed; the sweep carried on past them
    pub failures: Vec<SweepFailure>,
    /// Waitlist candidates surfaced by the released seats
    pub promotions: Vec<WaitlistEntry>,
}

impl ExpiryReport {
    /// Total seats returned by the sweep
    #[must_use]
    pub fn released_seats(&self) -> u64 {
        self.details.iter().map(|d| u64::from(d.released_seats)).sum()
    }
}

/// Pending options whose deadline is strictly before `now`.
pub fn expired_options<'a>(
    reservations: impl IntoIterator<Item = &'a Reservation>,
    now: DateTime<Utc>,
) -> impl Iterator<Item = &'a Reservation> {
    reservations.into_iter().filter(move |r| r.option_expired(now))
}

/// Pending options lapsing within `within_days` of `now`, soonest first.
#[must_use]
pub fn options_expiring_soon<'a>(
    reservations: impl IntoIterator<Item = &'a Reservation>,
    now: DateTime<Utc>,
    within_days: u32,
) -> Vec<&'a Reservation> {
    let horizon = now
        .checked_add_signed(Duration::days(i64::from(within_days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let mut soon: Vec<_> = reservations
        .into_iter()
        .filter(|r| r.status == ReservationStatus::Pending)
        .filter(|r| r.option_expires_at.is_some_and(|at| at >= now && at <= horizon))
        .collect();
    soon.sort_by_key(|r| (r.option_expires_at, r.id));
    soon
}

/// Snapshot of the running options
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OptionReport {
    /// Pending options not yet lapsed
    pub total_active: usize,
    /// Of those, how many lapse within the warning window
    pub expiring_soon: usize,
    /// Seats held by active options
    pub capacity_reserved: u64,
    /// When the oldest active option was placed
    pub oldest_option_placed_at: Option<DateTime<Utc>>,
}

/// Summarise active options at `now`.
#[must_use]
pub fn option_report<'a>(
    reservations: impl IntoIterator<Item = &'a Reservation>,
    now: DateTime<Utc>,
    expiring_within_days: u32,
) -> OptionReport {
    let active: Vec<_> = reservations
        .into_iter()
        .filter(|r| r.status == ReservationStatus::Pending && !r.option_expired(now))
        .collect();

    OptionReport {
        total_active: active.len(),
        expiring_soon: options_expiring_soon(active.iter().copied(), now, expiring_within_days).len(),
        capacity_reserved: active.iter().map(|r| u64::from(r.party_size)).sum(),
        oldest_option_placed_at: active
            .iter()
            .map(|r| r.option_placed_at.unwrap_or(r.created_at))
            .min(),
    }
}
