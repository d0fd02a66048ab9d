//! Service facade over the booking aggregate.
//!
//! Every write follows the same path: take the event's writer lane, load
//! the [`EventBook`] from the repository, reduce the action, commit the
//! touched rows in one [`ChangeSet`], release the lane, then run the
//! notification effects. Holding the lane across load, reduce and commit
//! is what makes capacity checks race-free.

use crate::aggregates::{BookingAction, BookingEnvironment, BookingReducer, ChangeLog, EventBook};
use crate::archive::{self, ArchiveSummary, ArchivedRecord};
use crate::config::VenueConfig;
use crate::deadline::{DeadlineAssessment, DeadlinePolicy, PaymentUrgency};
use crate::error::{Result, VenueError};
use crate::expiry::{self, ExpiredOption, ExpiryReport, OptionReport, SweepFailure};
use crate::lifecycle::ReservationStatus;
use crate::metrics;
use crate::notify::Notifier;
use crate::repository::{ChangeSet, VenueRepository};
use crate::types::{
    Event, EventId, Money, Reservation, ReservationId, WaitlistEntry, WaitlistEntryId,
};
use crate::waitlist;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use venue_ops_core::{effect::Effect, environment::Clock, reducer::Reducer};
use venue_ops_runtime::{execute_all, WriterLanes};

/// Result of an explicit cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelOutcome {
    /// The cancelled reservation
    pub reservation: Reservation,
    /// Seats returned to the event
    pub released_seats: u32,
    /// Waitlist entry that fits the released seats, if any
    pub promotion: Option<WaitlistEntry>,
}

/// A reservation that needs chasing for payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentReminder {
    /// The reservation
    pub reservation: Reservation,
    /// When its event starts
    pub event_starts_at: DateTime<Utc>,
    /// Urgency and deadline
    pub assessment: DeadlineAssessment,
}

/// Status change applied to many reservations at once
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BulkCommand {
    /// Confirm each reservation
    Confirm,
    /// Check each reservation in
    CheckIn,
    /// Cancel each reservation
    Cancel {
        /// Reason recorded on every cancellation
        reason: Option<String>,
    },
    /// Reject each reservation
    Reject {
        /// Reason recorded on every rejection
        reason: Option<String>,
    },
}

impl BulkCommand {
    fn action_for(&self, reservation_id: ReservationId) -> BookingAction {
        match self {
            Self::Confirm => BookingAction::Confirm { reservation_id },
            Self::CheckIn => BookingAction::CheckIn { reservation_id },
            Self::Cancel { reason } => BookingAction::Cancel {
                reservation_id,
                reason: reason.clone(),
            },
            Self::Reject { reason } => BookingAction::Reject {
                reservation_id,
                reason: reason.clone(),
            },
        }
    }
}

/// Per-item outcome of a bulk update
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkResult {
    /// Reservation the command was applied to
    pub reservation_id: ReservationId,
    /// Updated reservation, or why it was refused
    pub result: Result<Reservation>,
}

/// Entry point for every venue operation
#[derive(Clone)]
pub struct VenueService {
    repository: Arc<dyn VenueRepository>,
    lanes: WriterLanes<EventId>,
    reducer: BookingReducer,
    env: BookingEnvironment,
    deadline_policy: DeadlinePolicy,
    expiring_soon_days: u32,
}

impl VenueService {
    /// Create a service with the default deadline policy and a three day
    /// "expiring soon" window.
    #[must_use]
    pub fn new(repository: Arc<dyn VenueRepository>, env: BookingEnvironment) -> Self {
        Self {
            repository,
            lanes: WriterLanes::new(),
            reducer: BookingReducer::new(),
            env,
            deadline_policy: DeadlinePolicy::default(),
            expiring_soon_days: 3,
        }
    }

    /// Create a service from configuration.
    #[must_use]
    pub fn from_config(
        repository: Arc<dyn VenueRepository>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: &VenueConfig,
    ) -> Self {
        Self {
            deadline_policy: config.deadline_policy(),
            expiring_soon_days: config.expiring_soon_days,
            ..Self::new(
                repository,
                BookingEnvironment::new(clock, notifier, config.option_window_days),
            )
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    // ========================================================================
    // Write path
    // ========================================================================

    async fn load_book(&self, event_id: EventId) -> Result<EventBook> {
        let event = self
            .repository
            .get_event(event_id)
            .await?
            .ok_or(VenueError::EventNotFound(event_id))?;
        let reservations = self.repository.list_reservations_by_event(event_id).await?;
        let waitlist = self.repository.list_waitlist_by_event(event_id).await?;
        Ok(EventBook::load(event, reservations, waitlist))
    }

    /// Reduce one action against the event's book and commit the result.
    ///
    /// Returns the book as committed and what changed.
    #[tracing::instrument(skip(self, action), fields(event_id = %event_id))]
    async fn dispatch(&self, event_id: EventId, action: BookingAction) -> Result<(EventBook, ChangeLog)> {
        let lane = self.lanes.acquire(&event_id).await;

        let mut book = self.load_book(event_id).await?;
        let effects = self
            .reducer
            .reduce(&mut book, action, &self.env)
            .inspect_err(|error| {
                if matches!(error, VenueError::CapacityExceeded { .. }) {
                    metrics::record_capacity_rejection();
                }
                tracing::debug!(%error, "Action rejected");
            })?;

        let changes = book.take_changes();
        self.repository
            .commit(ChangeSet::from_book(&book, &changes))
            .await?;
        drop(lane);

        metrics::record_changes(&changes);
        Self::run_effects(effects).await;
        Ok((book, changes))
    }

    async fn run_effects(effects: impl IntoIterator<Item = Effect<BookingAction>>) {
        let feedback = execute_all(effects).await;
        if !feedback.is_empty() {
            tracing::debug!(count = feedback.len(), "Ignoring actions produced by effects");
        }
    }

    async fn event_of(&self, reservation_id: ReservationId) -> Result<EventId> {
        self.repository
            .get_reservation(reservation_id)
            .await?
            .map(|r| r.event_id)
            .ok_or(VenueError::ReservationNotFound(reservation_id))
    }

    async fn event_of_entry(&self, entry_id: WaitlistEntryId) -> Result<EventId> {
        self.repository
            .get_waitlist_entry(entry_id)
            .await?
            .map(|w| w.event_id)
            .ok_or(VenueError::WaitlistEntryNotFound(entry_id))
    }

    /// Dispatch an action on a reservation and return it as committed.
    async fn update_reservation(&self, reservation_id: ReservationId, action: BookingAction) -> Result<Reservation> {
        let event_id = self.event_of(reservation_id).await?;
        let (book, _) = self.dispatch(event_id, action).await?;
        book.reservation(&reservation_id)
            .cloned()
            .ok_or(VenueError::ReservationNotFound(reservation_id))
    }

    /// Dispatch an action on a waitlist entry and return it as committed.
    async fn update_entry(&self, entry_id: WaitlistEntryId, action: BookingAction) -> Result<WaitlistEntry> {
        let event_id = self.event_of_entry(entry_id).await?;
        let (book, _) = self.dispatch(event_id, action).await?;
        book.waitlist_entry(&entry_id)
            .cloned()
            .ok_or(VenueError::WaitlistEntryNotFound(entry_id))
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Create an event with nothing booked.
    ///
    /// # Errors
    ///
    /// Repository failures.
    #[tracing::instrument(skip(self, name))]
    pub async fn create_event(&self, name: impl Into<String>, starts_at: DateTime<Utc>, capacity: u32) -> Result<Event> {
        let event = Event::new(name, starts_at, capacity, self.now());
        self.repository.save_event(event.clone()).await?;
        tracing::info!(event_id = %event.id, capacity, "Event created");
        Ok(event)
    }

    /// Resize an event.
    ///
    /// # Errors
    ///
    /// [`VenueError::CapacityBelowCommitted`] when shrinking below the held seats.
    pub async fn set_capacity(&self, event_id: EventId, capacity: u32) -> Result<Event> {
        let (book, _) = self.dispatch(event_id, BookingAction::SetCapacity { capacity }).await?;
        Ok(book.event().clone())
    }

    /// Load an event.
    ///
    /// # Errors
    ///
    /// [`VenueError::EventNotFound`] or repository failures.
    pub async fn get_event(&self, event_id: EventId) -> Result<Event> {
        self.repository
            .get_event(event_id)
            .await?
            .ok_or(VenueError::EventNotFound(event_id))
    }

    /// Seats currently held for an event, from the rebuilt ledger.
    ///
    /// # Errors
    ///
    /// [`VenueError::EventNotFound`] or repository failures.
    pub async fn committed_seats(&self, event_id: EventId) -> Result<u32> {
        Ok(self.load_book(event_id).await?.ledger().committed_seats())
    }

    // ========================================================================
    // Reservations
    // ========================================================================

    /// Submit a booking request. No seats are held yet.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidPartySize`], [`VenueError::EventNotFound`] or
    /// repository failures.
    #[tracing::instrument(skip(self, customer_name))]
    pub async fn submit_request(
        &self,
        event_id: EventId,
        customer_name: impl Into<String>,
        party_size: u32,
        total_price: Money,
    ) -> Result<Reservation> {
        let reservation_id = ReservationId::new();
        let (book, _) = self
            .dispatch(
                event_id,
                BookingAction::SubmitRequest {
                    reservation_id,
                    customer_name: customer_name.into(),
                    party_size,
                    total_price,
                },
            )
            .await?;
        book.reservation(&reservation_id)
            .cloned()
            .ok_or(VenueError::ReservationNotFound(reservation_id))
    }

    /// Place an option, holding seats until `expires_at` (or the default window).
    ///
    /// # Errors
    ///
    /// [`VenueError::CapacityExceeded`], [`VenueError::InvalidTransition`],
    /// [`VenueError::OptionExpired`] for a deadline in the past.
    pub async fn grant_option(&self, reservation_id: ReservationId, expires_at: Option<DateTime<Utc>>) -> Result<Reservation> {
        self.update_reservation(
            reservation_id,
            BookingAction::GrantOption {
                reservation_id,
                expires_at,
            },
        )
        .await
    }

    /// Confirm a request, option or waitlisted reservation.
    ///
    /// # Errors
    ///
    /// [`VenueError::CapacityExceeded`], [`VenueError::InvalidTransition`] or
    /// [`VenueError::OptionExpired`].
    pub async fn confirm(&self, reservation_id: ReservationId) -> Result<Reservation> {
        self.update_reservation(reservation_id, BookingAction::Confirm { reservation_id })
            .await
    }

    /// Reject a request.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidTransition`] unless the reservation is a request.
    pub async fn reject(&self, reservation_id: ReservationId, reason: Option<String>) -> Result<Reservation> {
        self.update_reservation(reservation_id, BookingAction::Reject { reservation_id, reason })
            .await
    }

    /// Move a request to the waitlist status.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidTransition`] unless the reservation is a request.
    pub async fn move_to_waitlist(&self, reservation_id: ReservationId) -> Result<Reservation> {
        self.update_reservation(reservation_id, BookingAction::MoveToWaitlist { reservation_id })
            .await
    }

    /// Cancel a reservation, releasing its seats.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidTransition`] from a terminal status.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(&self, reservation_id: ReservationId, reason: Option<String>) -> Result<CancelOutcome> {
        let event_id = self.event_of(reservation_id).await?;
        let (book, changes) = self
            .dispatch(event_id, BookingAction::Cancel { reservation_id, reason })
            .await?;
        let reservation = book
            .reservation(&reservation_id)
            .cloned()
            .ok_or(VenueError::ReservationNotFound(reservation_id))?;

        Ok(CancelOutcome {
            reservation,
            released_seats: changes.released_seats,
            promotion: changes.promotions.into_iter().next().map(|p| p.candidate),
        })
    }

    /// Check a confirmed party in.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidTransition`] unless the reservation is confirmed.
    pub async fn check_in(&self, reservation_id: ReservationId) -> Result<Reservation> {
        self.update_reservation(reservation_id, BookingAction::CheckIn { reservation_id })
            .await
    }

    /// Push an option's deadline forward.
    ///
    /// # Errors
    ///
    /// [`VenueError::OptionExpired`] once lapsed, [`VenueError::InvalidTransition`]
    /// when not an option.
    pub async fn extend_option(&self, reservation_id: ReservationId, additional_days: u32) -> Result<Reservation> {
        self.update_reservation(
            reservation_id,
            BookingAction::ExtendOption {
                reservation_id,
                additional_days,
            },
        )
        .await
    }

    /// Change the party size of a reservation that holds no seats.
    ///
    /// # Errors
    ///
    /// [`VenueError::PartySizeFrozen`] or [`VenueError::InvalidPartySize`].
    pub async fn change_party_size(&self, reservation_id: ReservationId, party_size: u32) -> Result<Reservation> {
        self.update_reservation(
            reservation_id,
            BookingAction::ChangePartySize {
                reservation_id,
                party_size,
            },
        )
        .await
    }

    /// Record a payment.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidAmount`] for zero.
    pub async fn record_payment(
        &self,
        reservation_id: ReservationId,
        amount: Money,
        reference: impl Into<String>,
    ) -> Result<Reservation> {
        self.update_reservation(
            reservation_id,
            BookingAction::RecordPayment {
                reservation_id,
                amount,
                reference: reference.into(),
            },
        )
        .await
    }

    /// Record a refund.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidAmount`] or [`VenueError::RefundExceedsBalance`].
    pub async fn record_refund(
        &self,
        reservation_id: ReservationId,
        amount: Money,
        reference: impl Into<String>,
    ) -> Result<Reservation> {
        self.update_reservation(
            reservation_id,
            BookingAction::RecordRefund {
                reservation_id,
                amount,
                reference: reference.into(),
            },
        )
        .await
    }

    /// Archive a reservation, writing its immutable record.
    ///
    /// # Errors
    ///
    /// [`VenueError::AlreadyArchived`], or a repository conflict if a
    /// concurrent archive won.
    #[tracing::instrument(skip(self, archived_by, reason))]
    pub async fn archive(
        &self,
        reservation_id: ReservationId,
        archived_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<ArchivedRecord> {
        let event_id = self.event_of(reservation_id).await?;
        let (_, changes) = self
            .dispatch(
                event_id,
                BookingAction::Archive {
                    reservation_id,
                    archived_by: archived_by.into(),
                    reason: reason.into(),
                },
            )
            .await?;
        changes
            .archive
            .ok_or(VenueError::ReservationNotFound(reservation_id))
    }

    /// Apply one status command to many reservations, independently.
    pub async fn bulk_update(&self, reservation_ids: &[ReservationId], command: BulkCommand) -> Vec<BulkResult> {
        let mut results = Vec::with_capacity(reservation_ids.len());
        for &reservation_id in reservation_ids {
            let result = self
                .update_reservation(reservation_id, command.action_for(reservation_id))
                .await;
            if let Err(error) = &result {
                tracing::debug!(%reservation_id, %error, "Bulk item refused");
            }
            results.push(BulkResult {
                reservation_id,
                result,
            });
        }
        results
    }

    /// Load a reservation.
    ///
    /// # Errors
    ///
    /// [`VenueError::ReservationNotFound`] or repository failures.
    pub async fn get_reservation(&self, reservation_id: ReservationId) -> Result<Reservation> {
        self.repository
            .get_reservation(reservation_id)
            .await?
            .ok_or(VenueError::ReservationNotFound(reservation_id))
    }

    /// Reservations of an event that are not archived.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn active_reservations(&self, event_id: EventId) -> Result<Vec<Reservation>> {
        Ok(self
            .repository
            .list_reservations_by_event(event_id)
            .await?
            .into_iter()
            .filter(|r| !r.is_archived())
            .collect())
    }

    // ========================================================================
    // Waitlist
    // ========================================================================

    /// Add a party to an event's waitlist.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidPartySize`] or [`VenueError::EventNotFound`].
    pub async fn join_waitlist(
        &self,
        event_id: EventId,
        customer_name: impl Into<String>,
        party_size: u32,
    ) -> Result<WaitlistEntry> {
        let entry_id = WaitlistEntryId::new();
        let (book, _) = self
            .dispatch(
                event_id,
                BookingAction::JoinWaitlist {
                    entry_id,
                    customer_name: customer_name.into(),
                    party_size,
                },
            )
            .await?;
        book.waitlist_entry(&entry_id)
            .cloned()
            .ok_or(VenueError::WaitlistEntryNotFound(entry_id))
    }

    /// Record that staff reached out to a waiting party.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidWaitlistTransition`] unless pending.
    pub async fn mark_contacted(&self, entry_id: WaitlistEntryId, contacted_by: impl Into<String>) -> Result<WaitlistEntry> {
        self.update_entry(
            entry_id,
            BookingAction::MarkContacted {
                entry_id,
                contacted_by: contacted_by.into(),
            },
        )
        .await
    }

    /// Record the reservation created for a waiting party.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidWaitlistTransition`] from a terminal status, or
    /// [`VenueError::ReservationNotFound`] if the reservation is not on the
    /// same event.
    pub async fn mark_converted(&self, entry_id: WaitlistEntryId, reservation_id: ReservationId) -> Result<WaitlistEntry> {
        self.update_entry(
            entry_id,
            BookingAction::MarkConverted {
                entry_id,
                reservation_id,
            },
        )
        .await
    }

    /// Expire a waitlist entry.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidWaitlistTransition`] from a terminal status.
    pub async fn expire_waitlist_entry(&self, entry_id: WaitlistEntryId) -> Result<WaitlistEntry> {
        self.update_entry(entry_id, BookingAction::ExpireWaitlistEntry { entry_id })
            .await
    }

    /// Cancel a waitlist entry.
    ///
    /// # Errors
    ///
    /// [`VenueError::InvalidWaitlistTransition`] from a terminal status.
    pub async fn cancel_waitlist_entry(&self, entry_id: WaitlistEntryId) -> Result<WaitlistEntry> {
        self.update_entry(entry_id, BookingAction::CancelWaitlistEntry { entry_id })
            .await
    }

    /// The waitlist entry that would be offered `released` seats on an event.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn on_seats_released(&self, event_id: EventId, released: u32) -> Result<Option<WaitlistEntry>> {
        let entries = self.repository.list_pending_waitlist(event_id).await?;
        Ok(waitlist::on_seats_released(&entries, released).cloned())
    }

    // ========================================================================
    // Option expiry
    // ========================================================================

    /// Cancel every pending option whose deadline is before `now`.
    ///
    /// Items are grouped per event and processed under that event's lane.
    /// Each item is re-checked after the lane is taken, so an option
    /// confirmed or cancelled in the meantime is skipped. A failing item is
    /// recorded in the report and the sweep moves on.
    ///
    /// # Errors
    ///
    /// Only if the initial listing of pending reservations fails.
    #[tracing::instrument(skip(self))]
    pub async fn process_expired_options(&self, now: DateTime<Utc>) -> Result<ExpiryReport> {
        let pending = self
            .repository
            .list_reservations_by_status(ReservationStatus::Pending)
            .await?;

        let mut by_event: BTreeMap<EventId, Vec<ReservationId>> = BTreeMap::new();
        for reservation in expiry::expired_options(&pending, now) {
            by_event.entry(reservation.event_id).or_default().push(reservation.id);
        }

        let mut report = ExpiryReport::default();
        let mut effects = Vec::new();

        for (event_id, ids) in by_event {
            let lane = self.lanes.acquire(&event_id).await;

            let mut book = match self.load_book(event_id).await {
                Ok(book) => book,
                Err(error) => {
                    for reservation_id in ids {
                        record_failure(&mut report, event_id, reservation_id, error.clone());
                    }
                    continue;
                },
            };

            let mut remaining = ids.into_iter();
            while let Some(reservation_id) = remaining.next() {
                if !book.reservation(&reservation_id).is_some_and(|r| r.option_expired(now)) {
                    tracing::debug!(%reservation_id, "No longer an expired option, skipping");
                    continue;
                }

                match self.expire_one(&mut book, reservation_id, now).await {
                    Ok((changes, item_effects)) => {
                        report.cancelled_count += 1;
                        report.details.push(ExpiredOption {
                            reservation_id,
                            event_id,
                            released_seats: changes.released_seats,
                        });
                        report
                            .promotions
                            .extend(changes.promotions.iter().map(|p| p.candidate.clone()));
                        metrics::record_changes(&changes);
                        effects.extend(item_effects);
                    },
                    Err(error) => {
                        record_failure(&mut report, event_id, reservation_id, error);
                        match self.load_book(event_id).await {
                            Ok(fresh) => book = fresh,
                            Err(error) => {
                                for reservation_id in remaining.by_ref() {
                                    record_failure(&mut report, event_id, reservation_id, error.clone());
                                }
                            },
                        }
                    },
                }
            }

            drop(lane);
        }

        metrics::record_sweep(&report);
        // Notices for different options are independent of each other
        if !effects.is_empty() {
            Self::run_effects([Effect::merge(effects)]).await;
        }

        tracing::info!(
            cancelled = report.cancelled_count,
            released_seats = report.released_seats(),
            failed = report.failures.len(),
            promotions = report.promotions.len(),
            "Option expiry sweep finished"
        );
        Ok(report)
    }

    async fn expire_one(
        &self,
        book: &mut EventBook,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<(ChangeLog, Vec<Effect<BookingAction>>)> {
        let effects = self.reducer.reduce(
            book,
            BookingAction::ExpireOption { reservation_id, now },
            &self.env,
        )?;
        let changes = book.take_changes();
        self.repository
            .commit(ChangeSet::from_book(book, &changes))
            .await?;
        Ok((changes, effects.into_vec()))
    }

    /// Run the sweep at the clock's current time, as done when an admin
    /// session starts.
    ///
    /// # Errors
    ///
    /// See [`process_expired_options`](Self::process_expired_options).
    pub async fn start_session(&self) -> Result<ExpiryReport> {
        self.process_expired_options(self.now()).await
    }

    /// Options lapsing within the configured window, soonest first.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn options_expiring_soon(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let pending = self
            .repository
            .list_reservations_by_status(ReservationStatus::Pending)
            .await?;
        Ok(expiry::options_expiring_soon(&pending, now, self.expiring_soon_days)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Summary of the running options.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn option_report(&self, now: DateTime<Utc>) -> Result<OptionReport> {
        let pending = self
            .repository
            .list_reservations_by_status(ReservationStatus::Pending)
            .await?;
        Ok(expiry::option_report(&pending, now, self.expiring_soon_days))
    }

    // ========================================================================
    // Payments and archive reporting
    // ========================================================================

    /// Confirmed and checked-in reservations that need a payment reminder,
    /// most urgent first.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn payment_reminders(&self, now: DateTime<Utc>) -> Result<Vec<PaymentReminder>> {
        let events: HashMap<EventId, Event> = self
            .repository
            .list_events()
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        let mut reminders = Vec::new();
        for status in [ReservationStatus::Confirmed, ReservationStatus::CheckedIn] {
            for reservation in self.repository.list_reservations_by_status(status).await? {
                if reservation.is_archived() {
                    continue;
                }
                let Some(event) = events.get(&reservation.event_id) else {
                    tracing::warn!(reservation_id = %reservation.id, "Reservation without event");
                    continue;
                };
                let assessment =
                    self.deadline_policy
                        .assess(event.starts_at, reservation.payment_status(), now);
                if assessment.urgency != PaymentUrgency::Safe {
                    reminders.push(PaymentReminder {
                        event_starts_at: event.starts_at,
                        reservation,
                        assessment,
                    });
                }
            }
        }

        reminders.sort_by(|a, b| {
            b.assessment
                .urgency
                .severity()
                .cmp(&a.assessment.urgency.severity())
                .then(a.assessment.days_until_deadline.cmp(&b.assessment.days_until_deadline))
                .then(a.reservation.id.cmp(&b.reservation.id))
        });
        Ok(reminders)
    }

    /// Totals across every archive record.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn archive_summary(&self) -> Result<ArchiveSummary> {
        let records = self.repository.list_archives().await?;
        Ok(archive::archive_summary(&records))
    }

    /// Load the archive record of a reservation.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn get_archive(&self, reservation_id: ReservationId) -> Result<Option<ArchivedRecord>> {
        Ok(self.repository.get_archive(reservation_id).await?)
    }
}

fn record_failure(report: &mut ExpiryReport, event_id: EventId, reservation_id: ReservationId, error: VenueError) {
    tracing::warn!(%event_id, %reservation_id, %error, "Failed to expire option");
    report.failures.push(SweepFailure {
        reservation_id,
        event_id,
        error,
    });
}
