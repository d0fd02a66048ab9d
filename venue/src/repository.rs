//! Persistence boundary.
//!
//! The engine only talks to storage through [`VenueRepository`]. Writes
//! from one reduce call arrive as a single [`ChangeSet`] so the store can
//! apply them atomically.

use crate::aggregates::{ChangeLog, EventBook};
use crate::archive::ArchivedRecord;
use crate::error::RepositoryError;
use crate::lifecycle::ReservationStatus;
use crate::types::{Event, EventId, Reservation, ReservationId, WaitlistEntry, WaitlistEntryId};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by repository methods
pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Rows written by one reduce call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Event row, if it changed
    pub event: Option<Event>,
    /// Reservations to upsert
    pub reservations: Vec<Reservation>,
    /// Waitlist entries to upsert
    pub waitlist: Vec<WaitlistEntry>,
    /// Archive record to insert
    pub archive: Option<ArchivedRecord>,
}

impl ChangeSet {
    /// Collect the rows named in `changes` from the book.
    #[must_use]
    pub fn from_book(book: &EventBook, changes: &ChangeLog) -> Self {
        Self {
            event: changes.event_changed.then(|| book.event().clone()),
            reservations: changes
                .reservations
                .iter()
                .filter_map(|id| book.reservation(id).cloned())
                .collect(),
            waitlist: changes
                .waitlist
                .iter()
                .filter_map(|id| book.waitlist_entry(id).cloned())
                .collect(),
            archive: changes.archive.clone(),
        }
    }

    /// Whether there is nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event.is_none()
            && self.reservations.is_empty()
            && self.waitlist.is_empty()
            && self.archive.is_none()
    }
}

/// Storage for events, reservations, waitlist entries and archives
///
/// Methods return boxed futures so the trait can be used as
/// `Arc<dyn VenueRepository>`.
pub trait VenueRepository: Send + Sync {
    /// Load an event.
    fn get_event(&self, id: EventId) -> RepoFuture<'_, Option<Event>>;

    /// Upsert an event.
    fn save_event(&self, event: Event) -> RepoFuture<'_, ()>;

    /// All events, ordered by start time.
    fn list_events(&self) -> RepoFuture<'_, Vec<Event>>;

    /// Load a reservation.
    fn get_reservation(&self, id: ReservationId) -> RepoFuture<'_, Option<Reservation>>;

    /// All reservations for an event.
    fn list_reservations_by_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Reservation>>;

    /// Reservations across all events in one status.
    fn list_reservations_by_status(&self, status: ReservationStatus) -> RepoFuture<'_, Vec<Reservation>>;

    /// Load a waitlist entry.
    fn get_waitlist_entry(&self, id: WaitlistEntryId) -> RepoFuture<'_, Option<WaitlistEntry>>;

    /// All waitlist entries for an event.
    fn list_waitlist_by_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<WaitlistEntry>>;

    /// Pending waitlist entries of one event, oldest first.
    fn list_pending_waitlist(&self, event_id: EventId) -> RepoFuture<'_, Vec<WaitlistEntry>>;

    /// Load the archive record for a reservation.
    fn get_archive(&self, id: ReservationId) -> RepoFuture<'_, Option<ArchivedRecord>>;

    /// All archive records.
    fn list_archives(&self) -> RepoFuture<'_, Vec<ArchivedRecord>>;

    /// Apply a change set atomically.
    ///
    /// Either every row is written or none is. An archive record for a
    /// reservation that already has one is a [`RepositoryError::Conflict`].
    fn commit(&self, changes: ChangeSet) -> RepoFuture<'_, ()>;
}
