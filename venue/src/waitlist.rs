//! Waitlist promotion policy.
//!
//! When seats are released, the earliest pending entry that fits in the
//! released block is surfaced as a candidate. Parties are never split, and
//! a candidate is only surfaced; staff decide whether to contact it.

use crate::lifecycle::WaitlistStatus;
use crate::types::WaitlistEntry;

/// Pick the promotion candidate for a released block of seats.
///
/// Only `pending` entries are considered. Among those with
/// `party_size <= released`, the oldest by `created_at` wins; entry id
/// breaks ties so the choice is deterministic.
#[must_use]
pub fn on_seats_released<'a, I>(entries: I, released: u32) -> Option<&'a WaitlistEntry>
where
    I: IntoIterator<Item = &'a WaitlistEntry>,
{
    if released == 0 {
        return None;
    }

    entries
        .into_iter()
        .filter(|entry| entry.status == WaitlistStatus::Pending && entry.party_size <= released)
        .min_by_key(|entry| (entry.created_at, entry.id))
}
