//! In-memory repository
//!
//! Keeps every table behind one lock, which makes [`commit`] atomic for
//! free. Used by the sweeper binary and the test suites.
//!
//! [`commit`]: VenueRepository::commit

use crate::archive::ArchivedRecord;
use crate::error::RepositoryError;
use crate::lifecycle::{ReservationStatus, WaitlistStatus};
use crate::repository::{ChangeSet, RepoFuture, VenueRepository};
use crate::types::{Event, EventId, Reservation, ReservationId, WaitlistEntry, WaitlistEntryId};
use std::collections::HashMap;
#[cfg(test)]
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    reservations: HashMap<ReservationId, Reservation>,
    waitlist: HashMap<WaitlistEntryId, WaitlistEntry>,
    archives: HashMap<ReservationId, ArchivedRecord>,
    #[cfg(test)]
    failing_commits: HashSet<ReservationId>,
}

/// `HashMap`-backed [`VenueRepository`]
#[derive(Clone, Debug, Default)]
pub struct InMemoryVenueRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryVenueRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit touching `reservation_id` fail as unavailable.
    #[cfg(test)]
    pub(crate) fn fail_commits_for(&self, reservation_id: ReservationId) {
        self.write().failing_commits.insert(reservation_id);
    }

    /// Number of stored reservations
    #[must_use]
    pub fn reservation_count(&self) -> usize {
        self.read().reservations.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VenueRepository for InMemoryVenueRepository {
    fn get_event(&self, id: EventId) -> RepoFuture<'_, Option<Event>> {
        Box::pin(async move { Ok(self.read().events.get(&id).cloned()) })
    }

    fn save_event(&self, event: Event) -> RepoFuture<'_, ()> {
        Box::pin(async move {
            self.write().events.insert(event.id, event);
            Ok(())
        })
    }

    fn list_events(&self) -> RepoFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let mut events: Vec<_> = self.read().events.values().cloned().collect();
            events.sort_by_key(|e| (e.starts_at, e.id));
            Ok(events)
        })
    }

    fn get_reservation(&self, id: ReservationId) -> RepoFuture<'_, Option<Reservation>> {
        Box::pin(async move { Ok(self.read().reservations.get(&id).cloned()) })
    }

    fn list_reservations_by_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Reservation>> {
        Box::pin(async move {
            let mut rows: Vec<_> = self
                .read()
                .reservations
                .values()
                .filter(|r| r.event_id == event_id)
                .cloned()
                .collect();
            rows.sort_by_key(|r| (r.created_at, r.id));
            Ok(rows)
        })
    }

    fn list_reservations_by_status(&self, status: ReservationStatus) -> RepoFuture<'_, Vec<Reservation>> {
        Box::pin(async move {
            let mut rows: Vec<_> = self
                .read()
                .reservations
                .values()
                .filter(|r| r.status == status)
                .cloned()
                .collect();
            rows.sort_by_key(|r| (r.created_at, r.id));
            Ok(rows)
        })
    }

    fn get_waitlist_entry(&self, id: WaitlistEntryId) -> RepoFuture<'_, Option<WaitlistEntry>> {
        Box::pin(async move { Ok(self.read().waitlist.get(&id).cloned()) })
    }

    fn list_waitlist_by_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<WaitlistEntry>> {
        Box::pin(async move {
            let mut rows: Vec<_> = self
                .read()
                .waitlist
                .values()
                .filter(|w| w.event_id == event_id)
                .cloned()
                .collect();
            rows.sort_by_key(|w| (w.created_at, w.id));
            Ok(rows)
        })
    }

    fn list_pending_waitlist(&self, event_id: EventId) -> RepoFuture<'_, Vec<WaitlistEntry>> {
        Box::pin(async move {
            let mut rows: Vec<_> = self
                .read()
                .waitlist
                .values()
                .filter(|w| w.event_id == event_id && w.status == WaitlistStatus::Pending)
                .cloned()
                .collect();
            rows.sort_by_key(|w| (w.created_at, w.id));
            Ok(rows)
        })
    }

    fn get_archive(&self, id: ReservationId) -> RepoFuture<'_, Option<ArchivedRecord>> {
        Box::pin(async move { Ok(self.read().archives.get(&id).cloned()) })
    }

    fn list_archives(&self) -> RepoFuture<'_, Vec<ArchivedRecord>> {
        Box::pin(async move {
            let mut rows: Vec<_> = self.read().archives.values().cloned().collect();
            rows.sort_by_key(|a| (a.archived_at(), a.id()));
            Ok(rows)
        })
    }

    fn commit(&self, changes: ChangeSet) -> RepoFuture<'_, ()> {
        Box::pin(async move {
            let mut tables = self.write();

            // Validate everything before touching any table
            #[cfg(test)]
            if let Some(failing) = changes
                .reservations
                .iter()
                .find(|r| tables.failing_commits.contains(&r.id))
            {
                return Err(RepositoryError::Unavailable(format!(
                    "write of reservation {} failed",
                    failing.id
                )));
            }
            if let Some(record) = &changes.archive {
                if tables.archives.contains_key(&record.id()) {
                    return Err(RepositoryError::Conflict(format!(
                        "reservation {} is already archived",
                        record.id()
                    )));
                }
            }

            if let Some(event) = changes.event {
                tables.events.insert(event.id, event);
            }
            for reservation in changes.reservations {
                tables.reservations.insert(reservation.id, reservation);
            }
            for entry in changes.waitlist {
                tables.waitlist.insert(entry.id, entry);
            }
            if let Some(record) = changes.archive {
                tables.archives.insert(record.id(), record);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive;
    use crate::types::Money;
    use chrono::Duration;
    use venue_ops_core::environment::Clock;
    use venue_ops_testing::test_clock;

    fn event() -> Event {
        let now = test_clock().now();
        Event::new("Evening Show", now + Duration::days(10), 40, now)
    }

    fn reservation(event_id: EventId) -> Reservation {
        Reservation::new_request(
            ReservationId::new(),
            event_id,
            "Ada",
            2,
            Money::from_units(80),
            test_clock().now(),
        )
    }

    #[tokio::test]
    async fn test_commit_writes_all_rows() {
        let repo = InMemoryVenueRepository::new();
        let event = event();
        let res = reservation(event.id);

        repo.commit(ChangeSet {
            event: Some(event.clone()),
            reservations: vec![res.clone()],
            ..ChangeSet::default()
        })
        .await
        .unwrap();

        assert_eq!(repo.get_event(event.id).await.unwrap(), Some(event.clone()));
        assert_eq!(repo.get_reservation(res.id).await.unwrap(), Some(res));
        assert_eq!(repo.list_reservations_by_event(event.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_archive_conflicts_and_writes_nothing() {
        let repo = InMemoryVenueRepository::new();
        let event = event();
        let mut res = reservation(event.id);
        let record = archive::archive(&res, "ops", "done", test_clock().now()).unwrap();

        repo.commit(ChangeSet {
            archive: Some(record.clone()),
            ..ChangeSet::default()
        })
        .await
        .unwrap();

        res.customer_name = "Changed".to_string();
        let err = repo
            .commit(ChangeSet {
                reservations: vec![res.clone()],
                archive: Some(record),
                ..ChangeSet::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.get_reservation(res.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_injected_failure_is_unavailable() {
        let repo = InMemoryVenueRepository::new();
        let res = reservation(EventId::new());
        repo.fail_commits_for(res.id);

        let err = repo
            .commit(ChangeSet {
                reservations: vec![res],
                ..ChangeSet::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));
        assert_eq!(repo.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_status_listing_filters() {
        let repo = InMemoryVenueRepository::new();
        let event = event();
        let request = reservation(event.id);
        let mut pending = reservation(event.id);
        pending.status = ReservationStatus::Pending;

        repo.commit(ChangeSet {
            reservations: vec![request, pending.clone()],
            ..ChangeSet::default()
        })
        .await
        .unwrap();

        let rows = repo
            .list_reservations_by_status(ReservationStatus::Pending)
            .await
            .unwrap();
        assert_eq!(rows, vec![pending]);
    }

    #[tokio::test]
    async fn test_pending_waitlist_is_scoped_to_event() {
        let repo = InMemoryVenueRepository::new();
        let now = test_clock().now();
        let show = EventId::new();
        let other = EventId::new();

        let later = WaitlistEntry::new(WaitlistEntryId::new(), show, "Later", 2, now + Duration::minutes(5));
        let first = WaitlistEntry::new(WaitlistEntryId::new(), show, "First", 4, now);
        let mut contacted = WaitlistEntry::new(WaitlistEntryId::new(), show, "Called", 1, now);
        contacted.status = WaitlistStatus::Contacted;
        let elsewhere = WaitlistEntry::new(WaitlistEntryId::new(), other, "Elsewhere", 2, now);

        repo.commit(ChangeSet {
            waitlist: vec![later.clone(), first.clone(), contacted, elsewhere],
            ..ChangeSet::default()
        })
        .await
        .unwrap();

        let rows = repo.list_pending_waitlist(show).await.unwrap();
        assert_eq!(rows, vec![first, later]);
    }
}
