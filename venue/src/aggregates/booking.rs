//! Booking aggregate: one event, its reservations and its waitlist.
//!
//! All reservation status changes are validated here against the
//! transition table and, where seats change hands, against the event's
//! [`CapacityLedger`] in the same reduce call. A rejected action leaves the
//! book untouched.
//!
//! The book keeps a [`ChangeLog`] of what each action touched so the
//! service can persist exactly those entities in one atomic commit.

use crate::archive::{self, ArchivedRecord};
use crate::error::{RepositoryError, VenueError};
use crate::ledger::CapacityLedger;
use crate::lifecycle::{ReservationStatus, WaitlistStatus};
use crate::notify::{Notification, Notifier};
use crate::types::{
    Cancellation, CancellationCause, Event, Money, PaymentRecord, Reservation, ReservationId,
    WaitlistEntry, WaitlistEntryId,
};
use crate::waitlist;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use venue_ops_core::{async_effect, effect::Effect, environment::Clock, reducer::Reducer, SmallVec};

type Effects = SmallVec<[Effect<BookingAction>; 4]>;

// ============================================================================
// State
// ============================================================================

/// A reservation status change recorded by the book
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Reservation that moved
    pub reservation_id: ReservationId,
    /// Previous status, `None` for a new reservation
    pub from: Option<ReservationStatus>,
    /// New status
    pub to: ReservationStatus,
}

/// A waitlist candidate surfaced after a release
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promotion {
    /// Entry that fits the released block
    pub candidate: WaitlistEntry,
    /// Seats released
    pub released_seats: u32,
}

/// What the actions applied since the last [`EventBook::take_changes`] touched
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeLog {
    /// The event row (capacity or committed seats) changed
    pub event_changed: bool,
    /// Reservations written
    pub reservations: BTreeSet<ReservationId>,
    /// Waitlist entries written
    pub waitlist: BTreeSet<WaitlistEntryId>,
    /// Status changes, in order
    pub transitions: Vec<Transition>,
    /// Seats returned to the event
    pub released_seats: u32,
    /// Waitlist candidates surfaced, in order
    pub promotions: Vec<Promotion>,
    /// Archive record produced
    pub archive: Option<ArchivedRecord>,
}

impl ChangeLog {
    /// Whether nothing was touched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.event_changed
            && self.reservations.is_empty()
            && self.waitlist.is_empty()
            && self.archive.is_none()
    }
}

/// An event with everything booked against it
#[derive(Clone, Debug)]
pub struct EventBook {
    event: Event,
    ledger: CapacityLedger,
    reservations: BTreeMap<ReservationId, Reservation>,
    waitlist: BTreeMap<WaitlistEntryId, WaitlistEntry>,
    changes: ChangeLog,
}

impl EventBook {
    /// A book for an event with nothing booked yet
    #[must_use]
    pub fn new(event: Event) -> Self {
        let ledger = CapacityLedger::new(event.id, event.capacity);
        let mut book = Self {
            event,
            ledger,
            reservations: BTreeMap::new(),
            waitlist: BTreeMap::new(),
            changes: ChangeLog::default(),
        };
        book.sync_committed_seats();
        book.changes = ChangeLog::default();
        book
    }

    /// Assemble a book from stored rows.
    ///
    /// The ledger is rebuilt from the seat-holding reservations. If the
    /// stored `committed_seats` disagrees, it is repaired and the event is
    /// marked changed so the next commit writes the corrected value.
    #[must_use]
    pub fn load(
        event: Event,
        reservations: impl IntoIterator<Item = Reservation>,
        waitlist: impl IntoIterator<Item = WaitlistEntry>,
    ) -> Self {
        let reservations: BTreeMap<_, _> = reservations
            .into_iter()
            .filter(|r| r.event_id == event.id)
            .map(|r| (r.id, r))
            .collect();
        let waitlist: BTreeMap<_, _> = waitlist
            .into_iter()
            .filter(|w| w.event_id == event.id)
            .map(|w| (w.id, w))
            .collect();

        let ledger = CapacityLedger::rebuild(
            event.id,
            event.capacity,
            reservations
                .values()
                .filter(|r| r.holds_seats())
                .map(|r| (r.id, r.party_size)),
        );

        if ledger.committed_seats() > ledger.capacity() {
            tracing::warn!(
                event_id = %event.id,
                committed = ledger.committed_seats(),
                capacity = ledger.capacity(),
                "Stored reservations overbook the event"
            );
        }

        let mut book = Self {
            event,
            ledger,
            reservations,
            waitlist,
            changes: ChangeLog::default(),
        };

        if book.event.committed_seats != book.ledger.committed_seats() {
            tracing::warn!(
                event_id = %book.event.id,
                stored = book.event.committed_seats,
                actual = book.ledger.committed_seats(),
                "Committed seat cache out of sync, repairing"
            );
            book.sync_committed_seats();
        }

        book
    }

    /// The event
    #[must_use]
    pub const fn event(&self) -> &Event {
        &self.event
    }

    /// The capacity ledger
    #[must_use]
    pub const fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// One reservation
    #[must_use]
    pub fn reservation(&self, id: &ReservationId) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    /// All reservations, archived ones included
    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }

    /// Reservations that are not archived
    pub fn active_reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values().filter(|r| !r.is_archived())
    }

    /// One waitlist entry
    #[must_use]
    pub fn waitlist_entry(&self, id: &WaitlistEntryId) -> Option<&WaitlistEntry> {
        self.waitlist.get(id)
    }

    /// All waitlist entries
    pub fn waitlist(&self) -> impl Iterator<Item = &WaitlistEntry> {
        self.waitlist.values()
    }

    /// Changes since the last call, resetting the log
    pub fn take_changes(&mut self) -> ChangeLog {
        std::mem::take(&mut self.changes)
    }

    /// Changes since the last [`take_changes`](Self::take_changes)
    #[must_use]
    pub const fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    fn sync_committed_seats(&mut self) {
        self.event.committed_seats = self.ledger.committed_seats();
        self.event.capacity = self.ledger.capacity();
        self.changes.event_changed = true;
    }

    fn reservation_mut(&mut self, id: ReservationId) -> Result<&mut Reservation, VenueError> {
        self.reservations
            .get_mut(&id)
            .ok_or(VenueError::ReservationNotFound(id))
    }

    fn waitlist_mut(&mut self, id: WaitlistEntryId) -> Result<&mut WaitlistEntry, VenueError> {
        self.waitlist
            .get_mut(&id)
            .ok_or(VenueError::WaitlistEntryNotFound(id))
    }

    fn touch(&mut self, id: ReservationId) {
        self.changes.reservations.insert(id);
    }

    fn record_transition(&mut self, id: ReservationId, from: Option<ReservationStatus>, to: ReservationStatus) {
        self.changes.transitions.push(Transition {
            reservation_id: id,
            from,
            to,
        });
        self.touch(id);
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Commands accepted by the booking aggregate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingAction {
    /// Create a reservation in `request`
    SubmitRequest {
        /// Id for the new reservation
        reservation_id: ReservationId,
        /// Name the booking is under
        customer_name: String,
        /// Number of persons
        party_size: u32,
        /// Price for the party
        total_price: Money,
    },
    /// `request -> pending`, holding seats until the option expires
    GrantOption {
        /// Reservation
        reservation_id: ReservationId,
        /// Deadline; the configured window applies when absent
        expires_at: Option<DateTime<Utc>>,
    },
    /// `request | pending | waitlist -> confirmed`
    Confirm {
        /// Reservation
        reservation_id: ReservationId,
    },
    /// `request -> rejected`
    Reject {
        /// Reservation
        reservation_id: ReservationId,
        /// Reason given
        reason: Option<String>,
    },
    /// `request -> waitlist`
    MoveToWaitlist {
        /// Reservation
        reservation_id: ReservationId,
    },
    /// Explicit cancel, releasing any held seats
    Cancel {
        /// Reservation
        reservation_id: ReservationId,
        /// Reason given
        reason: Option<String>,
    },
    /// Cancel an option whose deadline is before `now`
    ExpireOption {
        /// Reservation
        reservation_id: ReservationId,
        /// Sweep time
        now: DateTime<Utc>,
    },
    /// `confirmed -> checked-in`
    CheckIn {
        /// Reservation
        reservation_id: ReservationId,
    },
    /// Push a running option's deadline forward
    ExtendOption {
        /// Reservation
        reservation_id: ReservationId,
        /// Days to add
        additional_days: u32,
    },
    /// Change the party size while no seats are held
    ChangePartySize {
        /// Reservation
        reservation_id: ReservationId,
        /// New size
        party_size: u32,
    },
    /// Append a payment
    RecordPayment {
        /// Reservation
        reservation_id: ReservationId,
        /// Amount received
        amount: Money,
        /// External reference
        reference: String,
    },
    /// Append a refund
    RecordRefund {
        /// Reservation
        reservation_id: ReservationId,
        /// Amount returned
        amount: Money,
        /// External reference
        reference: String,
    },
    /// Snapshot the reservation into an archive record
    Archive {
        /// Reservation
        reservation_id: ReservationId,
        /// Who archives
        archived_by: String,
        /// Why
        reason: String,
    },
    /// Resize the event
    SetCapacity {
        /// New total seats
        capacity: u32,
    },
    /// Add a party to the waitlist
    JoinWaitlist {
        /// Id for the new entry
        entry_id: WaitlistEntryId,
        /// Name the entry is under
        customer_name: String,
        /// Number of persons
        party_size: u32,
    },
    /// `pending -> contacted`
    MarkContacted {
        /// Entry
        entry_id: WaitlistEntryId,
        /// Staff member
        contacted_by: String,
    },
    /// `pending | contacted -> converted`
    MarkConverted {
        /// Entry
        entry_id: WaitlistEntryId,
        /// Reservation created for the party
        reservation_id: ReservationId,
    },
    /// `pending | contacted -> expired`
    ExpireWaitlistEntry {
        /// Entry
        entry_id: WaitlistEntryId,
    },
    /// `pending | contacted -> cancelled`
    CancelWaitlistEntry {
        /// Entry
        entry_id: WaitlistEntryId,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the booking aggregate
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Outbound notifications
    pub notifier: Arc<dyn Notifier>,
    /// Option length when no deadline is given
    pub option_window: Duration,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>, option_window_days: u32) -> Self {
        Self {
            clock,
            notifier,
            option_window: Duration::days(i64::from(option_window_days)),
        }
    }
}

impl std::fmt::Debug for BookingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEnvironment")
            .field("option_window", &self.option_window)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the booking aggregate
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Effect delivering one notification, logging failures
    fn notify(env: &BookingEnvironment, notification: Notification) -> Effect<BookingAction> {
        let notifier = Arc::clone(&env.notifier);
        async_effect! {
            let kind = notification.kind();
            if let Err(error) = notifier.notify(notification).await {
                tracing::warn!(kind, %error, "Notification failed");
                metrics::counter!("venue_notifications_failed_total", "kind" => kind).increment(1);
            }
            None
        }
    }

    fn validate_transition(reservation: &Reservation, to: ReservationStatus) -> Result<(), VenueError> {
        if reservation.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(VenueError::InvalidTransition {
                reservation_id: reservation.id,
                from: reservation.status,
                to,
            })
        }
    }

    fn validate_party_size(party_size: u32) -> Result<(), VenueError> {
        if party_size == 0 {
            return Err(VenueError::InvalidPartySize { party_size });
        }
        Ok(())
    }

    fn validate_waitlist_transition(entry: &WaitlistEntry, to: WaitlistStatus) -> Result<(), VenueError> {
        if entry.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(VenueError::InvalidWaitlistTransition {
                entry_id: entry.id,
                from: entry.status,
                to,
            })
        }
    }

    /// Move a reservation to `to`, stamping `updated_at`.
    fn apply_status(state: &mut EventBook, id: ReservationId, to: ReservationStatus, now: DateTime<Utc>) -> Result<ReservationStatus, VenueError> {
        let reservation = state.reservation_mut(id)?;
        let from = reservation.status;
        reservation.status = to;
        reservation.updated_at = now;
        state.record_transition(id, Some(from), to);
        Ok(from)
    }

    /// Release a cancelled reservation's seats and look for a waitlist fit.
    fn release_and_promote(
        state: &mut EventBook,
        id: ReservationId,
        env: &BookingEnvironment,
        effects: &mut Effects,
    ) -> u32 {
        let released = state.ledger.release_seats(&id);
        if released == 0 {
            return 0;
        }
        state.sync_committed_seats();
        state.changes.released_seats += released;

        if let Some(candidate) = waitlist::on_seats_released(state.waitlist.values(), released).cloned() {
            tracing::info!(
                event_id = %state.event.id,
                entry_id = %candidate.id,
                party_size = candidate.party_size,
                released,
                "Waitlist candidate for released seats"
            );
            effects.push(Self::notify(
                env,
                Notification::WaitlistSlotAvailable {
                    entry_id: candidate.id,
                    event_id: state.event.id,
                    party_size: candidate.party_size,
                    released_seats: released,
                },
            ));
            state.changes.promotions.push(Promotion {
                candidate,
                released_seats: released,
            });
        }

        released
    }

    fn cancel(
        state: &mut EventBook,
        id: ReservationId,
        cause: CancellationCause,
        reason: Option<String>,
        now: DateTime<Utc>,
        env: &BookingEnvironment,
        effects: &mut Effects,
    ) -> Result<u32, VenueError> {
        Self::apply_status(state, id, ReservationStatus::Cancelled, now)?;
        let reservation = state.reservation_mut(id)?;
        reservation.option_expires_at = None;
        reservation.cancellation = Some(Cancellation {
            cause,
            reason,
            at: now,
        });
        Ok(Self::release_and_promote(state, id, env, effects))
    }

    #[allow(clippy::too_many_lines)] // One arm per command
    fn reduce_command(
        state: &mut EventBook,
        action: BookingAction,
        env: &BookingEnvironment,
    ) -> Result<Effects, VenueError> {
        let now = env.clock.now();
        let mut effects = Effects::new();

        match action {
            BookingAction::SubmitRequest {
                reservation_id,
                customer_name,
                party_size,
                total_price,
            } => {
                Self::validate_party_size(party_size)?;
                if state.reservations.contains_key(&reservation_id) {
                    return Err(RepositoryError::Conflict(format!(
                        "reservation {reservation_id} already exists"
                    ))
                    .into());
                }
                state.reservations.insert(
                    reservation_id,
                    Reservation::new_request(
                        reservation_id,
                        state.event.id,
                        customer_name,
                        party_size,
                        total_price,
                        now,
                    ),
                );
                state.record_transition(reservation_id, None, ReservationStatus::Request);
            },

            BookingAction::GrantOption {
                reservation_id,
                expires_at,
            } => {
                let reservation = state.reservation_mut(reservation_id)?;
                Self::validate_transition(reservation, ReservationStatus::Pending)?;
                let expires_at = match expires_at {
                    Some(at) => at,
                    None => now
                        .checked_add_signed(env.option_window)
                        .ok_or(VenueError::DeadlineOutOfRange { reservation_id })?,
                };
                if expires_at <= now {
                    return Err(VenueError::OptionExpired {
                        reservation_id,
                        expired_at: expires_at,
                    });
                }
                let party_size = reservation.party_size;

                state.ledger.reserve_seats(reservation_id, party_size)?;
                state.sync_committed_seats();
                Self::apply_status(state, reservation_id, ReservationStatus::Pending, now)?;
                let reservation = state.reservation_mut(reservation_id)?;
                reservation.option_expires_at = Some(expires_at);
                reservation.option_placed_at = Some(now);
            },

            BookingAction::Confirm { reservation_id } => {
                let reservation = state.reservation_mut(reservation_id)?;
                Self::validate_transition(reservation, ReservationStatus::Confirmed)?;
                if reservation.status == ReservationStatus::Pending {
                    if let Some(expired_at) = reservation.option_expires_at.filter(|at| now > *at) {
                        return Err(VenueError::OptionExpired {
                            reservation_id,
                            expired_at,
                        });
                    }
                }
                let party_size = reservation.party_size;

                state.ledger.reserve_seats(reservation_id, party_size)?;
                state.sync_committed_seats();
                Self::apply_status(state, reservation_id, ReservationStatus::Confirmed, now)?;
                state.reservation_mut(reservation_id)?.option_expires_at = None;

                effects.push(Self::notify(
                    env,
                    Notification::ReservationConfirmed {
                        reservation_id,
                        event_id: state.event.id,
                        party_size,
                    },
                ));
            },

            BookingAction::Reject {
                reservation_id,
                reason,
            } => {
                Self::validate_transition(state.reservation_mut(reservation_id)?, ReservationStatus::Rejected)?;
                Self::apply_status(state, reservation_id, ReservationStatus::Rejected, now)?;
                state.reservation_mut(reservation_id)?.rejection_reason = reason;
            },

            BookingAction::MoveToWaitlist { reservation_id } => {
                Self::validate_transition(state.reservation_mut(reservation_id)?, ReservationStatus::Waitlisted)?;
                Self::apply_status(state, reservation_id, ReservationStatus::Waitlisted, now)?;
            },

            BookingAction::Cancel {
                reservation_id,
                reason,
            } => {
                Self::validate_transition(state.reservation_mut(reservation_id)?, ReservationStatus::Cancelled)?;
                Self::cancel(
                    state,
                    reservation_id,
                    CancellationCause::Requested,
                    reason,
                    now,
                    env,
                    &mut effects,
                )?;
            },

            BookingAction::ExpireOption {
                reservation_id,
                now: sweep_time,
            } => {
                let reservation = state.reservation_mut(reservation_id)?;
                if reservation.status != ReservationStatus::Pending {
                    return Err(VenueError::InvalidTransition {
                        reservation_id,
                        from: reservation.status,
                        to: ReservationStatus::Cancelled,
                    });
                }
                let Some(expired_at) = reservation.option_expires_at else {
                    return Err(RepositoryError::Corrupt(format!(
                        "option {reservation_id} has no expiry"
                    ))
                    .into());
                };
                if expired_at >= sweep_time {
                    return Err(VenueError::OptionStillActive {
                        reservation_id,
                        expires_at: expired_at,
                    });
                }

                let released = Self::cancel(
                    state,
                    reservation_id,
                    CancellationCause::Expired,
                    Some("option expired".to_string()),
                    sweep_time,
                    env,
                    &mut effects,
                )?;
                let expired_notice = Self::notify(
                    env,
                    Notification::OptionExpired {
                        reservation_id,
                        event_id: state.event.id,
                        released_seats: released,
                        expired_at,
                    },
                );
                // The expiry notice goes out before any waitlist offer it frees up
                let follow_up: Vec<_> = effects.drain(..).collect();
                effects.push(if follow_up.is_empty() {
                    expired_notice
                } else {
                    Effect::chain(std::iter::once(expired_notice).chain(follow_up).collect())
                });
            },

            BookingAction::CheckIn { reservation_id } => {
                Self::validate_transition(state.reservation_mut(reservation_id)?, ReservationStatus::CheckedIn)?;
                Self::apply_status(state, reservation_id, ReservationStatus::CheckedIn, now)?;
                state.reservation_mut(reservation_id)?.checked_in_at = Some(now);
            },

            BookingAction::ExtendOption {
                reservation_id,
                additional_days,
            } => {
                let reservation = state.reservation_mut(reservation_id)?;
                if reservation.status != ReservationStatus::Pending {
                    return Err(VenueError::InvalidTransition {
                        reservation_id,
                        from: reservation.status,
                        to: ReservationStatus::Pending,
                    });
                }
                let current = reservation.option_expires_at.unwrap_or(now);
                if now > current {
                    return Err(VenueError::OptionExpired {
                        reservation_id,
                        expired_at: current,
                    });
                }
                let extended = Duration::try_days(i64::from(additional_days))
                    .and_then(|extra| current.checked_add_signed(extra))
                    .ok_or(VenueError::DeadlineOutOfRange { reservation_id })?;
                reservation.option_expires_at = Some(extended);
                reservation.updated_at = now;
                state.touch(reservation_id);
            },

            BookingAction::ChangePartySize {
                reservation_id,
                party_size,
            } => {
                Self::validate_party_size(party_size)?;
                let reservation = state.reservation_mut(reservation_id)?;
                if !matches!(
                    reservation.status,
                    ReservationStatus::Request | ReservationStatus::Waitlisted
                ) {
                    return Err(VenueError::PartySizeFrozen {
                        reservation_id,
                        status: reservation.status,
                    });
                }
                reservation.party_size = party_size;
                reservation.updated_at = now;
                state.touch(reservation_id);
            },

            BookingAction::RecordPayment {
                reservation_id,
                amount,
                reference,
            } => {
                if amount.is_zero() {
                    return Err(VenueError::InvalidAmount);
                }
                let reservation = state.reservation_mut(reservation_id)?;
                reservation.payments.push(PaymentRecord {
                    amount,
                    recorded_at: now,
                    reference,
                });
                reservation.updated_at = now;
                state.touch(reservation_id);
            },

            BookingAction::RecordRefund {
                reservation_id,
                amount,
                reference,
            } => {
                if amount.is_zero() {
                    return Err(VenueError::InvalidAmount);
                }
                let reservation = state.reservation_mut(reservation_id)?;
                let refundable = reservation.net_paid();
                if amount > refundable {
                    return Err(VenueError::RefundExceedsBalance {
                        reservation_id,
                        requested: amount,
                        refundable,
                    });
                }
                reservation.refunds.push(PaymentRecord {
                    amount,
                    recorded_at: now,
                    reference,
                });
                reservation.updated_at = now;
                state.touch(reservation_id);
            },

            BookingAction::Archive {
                reservation_id,
                archived_by,
                reason,
            } => {
                let reservation = state.reservation_mut(reservation_id)?;
                let record = archive::archive(reservation, archived_by, reason, now)?;
                reservation.archived_at = Some(now);
                reservation.updated_at = now;
                state.touch(reservation_id);
                state.changes.archive = Some(record);
            },

            BookingAction::SetCapacity { capacity } => {
                state.ledger.set_capacity(capacity)?;
                state.sync_committed_seats();
            },

            BookingAction::JoinWaitlist {
                entry_id,
                customer_name,
                party_size,
            } => Self::join_waitlist(state, entry_id, customer_name, party_size, now)?,

            BookingAction::MarkContacted {
                entry_id,
                contacted_by,
            } => {
                let entry = Self::move_entry(state, entry_id, WaitlistStatus::Contacted, now)?;
                entry.contacted_at = Some(now);
                entry.contacted_by = Some(contacted_by);
            },

            BookingAction::MarkConverted {
                entry_id,
                reservation_id,
            } => {
                if !state.reservations.contains_key(&reservation_id) {
                    return Err(VenueError::ReservationNotFound(reservation_id));
                }
                Self::move_entry(state, entry_id, WaitlistStatus::Converted, now)?.converted_reservation =
                    Some(reservation_id);
            },

            BookingAction::ExpireWaitlistEntry { entry_id } => {
                Self::move_entry(state, entry_id, WaitlistStatus::Expired, now)?;
            },

            BookingAction::CancelWaitlistEntry { entry_id } => {
                Self::move_entry(state, entry_id, WaitlistStatus::Cancelled, now)?;
            },
        }

        Ok(effects)
    }

    fn join_waitlist(
        state: &mut EventBook,
        entry_id: WaitlistEntryId,
        customer_name: String,
        party_size: u32,
        now: DateTime<Utc>,
    ) -> Result<(), VenueError> {
        Self::validate_party_size(party_size)?;
        if state.waitlist.contains_key(&entry_id) {
            return Err(RepositoryError::Conflict(format!(
                "waitlist entry {entry_id} already exists"
            ))
            .into());
        }
        state.waitlist.insert(
            entry_id,
            WaitlistEntry::new(entry_id, state.event.id, customer_name, party_size, now),
        );
        state.changes.waitlist.insert(entry_id);
        Ok(())
    }

    /// Move a waitlist entry to `to`, stamping `updated_at`.
    fn move_entry(
        state: &mut EventBook,
        entry_id: WaitlistEntryId,
        to: WaitlistStatus,
        now: DateTime<Utc>,
    ) -> Result<&mut WaitlistEntry, VenueError> {
        state.changes.waitlist.insert(entry_id);
        let entry = state.waitlist_mut(entry_id)?;
        Self::validate_waitlist_transition(entry, to)?;
        entry.status = to;
        entry.updated_at = now;
        Ok(entry)
    }
}

impl Reducer for BookingReducer {
    type State = EventBook;
    type Action = BookingAction;
    type Environment = BookingEnvironment;
    type Error = VenueError;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<SmallVec<[Effect<Self::Action>; 4]>, Self::Error> {
        // Work on a scratch copy so a rejection leaves the book as it was
        let mut draft = state.clone();
        let effects = Self::reduce_command(&mut draft, action, env)?;
        *state = draft;
        Ok(effects)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use venue_ops_testing::{assertions, test_clock, ReducerTest};

    fn now() -> DateTime<Utc> {
        test_clock().now()
    }

    fn create_test_env() -> BookingEnvironment {
        BookingEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(RecordingNotifier::new()),
            7,
        )
    }

    fn empty_book(capacity: u32) -> EventBook {
        EventBook::new(Event::new("Murder at the Manor", now() + Duration::days(30), capacity, now()))
    }

    /// Apply actions to a fresh book, panicking on rejection
    fn book_after(capacity: u32, actions: Vec<BookingAction>) -> EventBook {
        let mut book = empty_book(capacity);
        let env = create_test_env();
        for action in actions {
            BookingReducer::new().reduce(&mut book, action, &env).unwrap();
        }
        book.take_changes();
        book
    }

    fn submit(id: ReservationId, party_size: u32) -> BookingAction {
        BookingAction::SubmitRequest {
            reservation_id: id,
            customer_name: "Agatha".to_string(),
            party_size,
            total_price: Money::from_units(u64::from(party_size) * 60),
        }
    }

    fn option(id: ReservationId) -> BookingAction {
        BookingAction::GrantOption {
            reservation_id: id,
            expires_at: None,
        }
    }

    #[test]
    fn test_submit_request_holds_no_seats() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(empty_book(10))
            .when_action(submit(id, 4))
            .then_state(move |book| {
                let res = book.reservation(&id).unwrap();
                assert_eq!(res.status, ReservationStatus::Request);
                assert_eq!(book.ledger().committed_seats(), 0);
                assert_eq!(book.changes().transitions.len(), 1);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn test_grant_option_reserves_seats_with_default_window() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 4)]))
            .when_action(option(id))
            .then_state(move |book| {
                let res = book.reservation(&id).unwrap();
                assert_eq!(res.status, ReservationStatus::Pending);
                assert_eq!(res.option_expires_at, Some(now() + Duration::days(7)));
                assert_eq!(res.option_placed_at, Some(now()));
                assert_eq!(book.ledger().committed_seats(), 4);
                assert_eq!(book.event().committed_seats, 4);
            })
            .run();
    }

    #[test]
    fn test_option_beyond_capacity_is_rejected_untouched() {
        let first = ReservationId::new();
        let second = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                5,
                vec![submit(first, 4), option(first), submit(second, 2)],
            ))
            .when_action(option(second))
            .then_error(|error| {
                assert!(matches!(
                    error,
                    VenueError::CapacityExceeded {
                        requested: 2,
                        available: 1,
                        ..
                    }
                ));
            })
            .then_state(move |book| {
                assert_eq!(book.reservation(&second).unwrap().status, ReservationStatus::Request);
                assert_eq!(book.ledger().committed_seats(), 4);
                assert!(book.changes().is_empty());
            })
            .run();
    }

    #[test]
    fn test_confirm_option_keeps_seats_and_notifies() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 3), option(id)]))
            .when_action(BookingAction::Confirm { reservation_id: id })
            .then_state(move |book| {
                let res = book.reservation(&id).unwrap();
                assert_eq!(res.status, ReservationStatus::Confirmed);
                assert_eq!(res.option_expires_at, None);
                assert_eq!(book.ledger().committed_seats(), 3);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn test_direct_confirm_reserves_seats() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 6)]))
            .when_action(BookingAction::Confirm { reservation_id: id })
            .then_state(move |book| {
                assert_eq!(book.ledger().held_by(&id), Some(6));
            })
            .run();
    }

    #[test]
    fn test_confirm_after_expiry_fails() {
        let id = ReservationId::new();
        let expires_at = now() - Duration::minutes(1);
        let mut book = book_after(10, vec![submit(id, 2), option(id)]);
        book.reservations.get_mut(&id).unwrap().option_expires_at = Some(expires_at);

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book)
            .when_action(BookingAction::Confirm { reservation_id: id })
            .then_error(move |error| {
                assert_eq!(
                    *error,
                    VenueError::OptionExpired {
                        reservation_id: id,
                        expired_at: expires_at,
                    }
                );
            })
            .then_state(move |book| {
                assert_eq!(book.reservation(&id).unwrap().status, ReservationStatus::Pending);
            })
            .run();
    }

    #[test]
    fn test_cancelled_cannot_be_confirmed() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                10,
                vec![
                    submit(id, 2),
                    option(id),
                    BookingAction::Cancel {
                        reservation_id: id,
                        reason: None,
                    },
                ],
            ))
            .when_action(BookingAction::Confirm { reservation_id: id })
            .then_error(|error| {
                assert!(matches!(
                    error,
                    VenueError::InvalidTransition {
                        from: ReservationStatus::Cancelled,
                        to: ReservationStatus::Confirmed,
                        ..
                    }
                ));
            })
            .run();
    }

    #[test]
    fn test_cancel_releases_seats_and_surfaces_waitlist_fit() {
        let id = ReservationId::new();
        let big = WaitlistEntryId::new();
        let small = WaitlistEntryId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                3,
                vec![
                    submit(id, 3),
                    BookingAction::Confirm { reservation_id: id },
                    BookingAction::JoinWaitlist {
                        entry_id: big,
                        customer_name: "Big".into(),
                        party_size: 4,
                    },
                    BookingAction::JoinWaitlist {
                        entry_id: small,
                        customer_name: "Small".into(),
                        party_size: 2,
                    },
                ],
            ))
            .when_action(BookingAction::Cancel {
                reservation_id: id,
                reason: Some("changed plans".into()),
            })
            .then_state(move |book| {
                let res = book.reservation(&id).unwrap();
                assert_eq!(res.status, ReservationStatus::Cancelled);
                let cancellation = res.cancellation.as_ref().unwrap();
                assert_eq!(cancellation.cause, CancellationCause::Requested);
                assert_eq!(cancellation.reason.as_deref(), Some("changed plans"));
                assert_eq!(book.ledger().committed_seats(), 0);
                assert_eq!(book.changes().released_seats, 3);

                let promotions = &book.changes().promotions;
                assert_eq!(promotions.len(), 1);
                assert_eq!(promotions[0].candidate.id, small);
                assert_eq!(promotions[0].released_seats, 3);
                // Surfaced only, not converted
                assert_eq!(
                    book.waitlist_entry(&small).unwrap().status,
                    WaitlistStatus::Pending
                );
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
            })
            .run();
    }

    #[test]
    fn test_cancel_from_waitlist_releases_nothing() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                1,
                vec![submit(id, 2), BookingAction::MoveToWaitlist { reservation_id: id }],
            ))
            .when_action(BookingAction::Cancel {
                reservation_id: id,
                reason: None,
            })
            .then_state(|book| {
                assert_eq!(book.ledger().committed_seats(), 0);
                assert!(book.changes().promotions.is_empty());
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn test_expire_option_cancels_with_expired_cause() {
        let id = ReservationId::new();
        let sweep_time = now() + Duration::days(8);

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2), option(id)]))
            .when_action(BookingAction::ExpireOption {
                reservation_id: id,
                now: sweep_time,
            })
            .then_state(move |book| {
                let res = book.reservation(&id).unwrap();
                assert_eq!(res.status, ReservationStatus::Cancelled);
                assert_eq!(res.option_expires_at, None);
                let cancellation = res.cancellation.as_ref().unwrap();
                assert_eq!(cancellation.cause, CancellationCause::Expired);
                assert_eq!(cancellation.at, sweep_time);
                assert_eq!(book.ledger().committed_seats(), 0);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
            })
            .run();
    }

    #[test]
    fn test_expire_running_option_is_refused() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2), option(id)]))
            .when_action(BookingAction::ExpireOption {
                reservation_id: id,
                now: now() + Duration::days(7),
            })
            .then_error(|error| {
                assert!(matches!(error, VenueError::OptionStillActive { .. }));
            })
            .run();
    }

    #[test]
    fn test_check_in_keeps_seats() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2), BookingAction::Confirm { reservation_id: id }]))
            .when_action(BookingAction::CheckIn { reservation_id: id })
            .then_state(move |book| {
                let res = book.reservation(&id).unwrap();
                assert_eq!(res.status, ReservationStatus::CheckedIn);
                assert_eq!(res.checked_in_at, Some(now()));
                assert_eq!(book.ledger().committed_seats(), 2);
            })
            .run();
    }

    #[test]
    fn test_extend_option_moves_deadline() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2), option(id)]))
            .when_action(BookingAction::ExtendOption {
                reservation_id: id,
                additional_days: 3,
            })
            .then_state(move |book| {
                assert_eq!(
                    book.reservation(&id).unwrap().option_expires_at,
                    Some(now() + Duration::days(10))
                );
            })
            .run();
    }

    #[test]
    fn test_extend_option_past_calendar_end_is_refused() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2), option(id)]))
            .when_action(BookingAction::ExtendOption {
                reservation_id: id,
                additional_days: u32::MAX,
            })
            .then_error(move |error| {
                assert_eq!(*error, VenueError::DeadlineOutOfRange { reservation_id: id });
            })
            .then_state(move |book| {
                assert_eq!(
                    book.reservation(&id).unwrap().option_expires_at,
                    Some(now() + Duration::days(7))
                );
            })
            .run();
    }

    #[test]
    fn test_grant_option_with_unbounded_window_is_refused() {
        let id = ReservationId::new();
        let env = BookingEnvironment::new(Arc::new(test_clock()), Arc::new(RecordingNotifier::new()), u32::MAX);

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(book_after(10, vec![submit(id, 2)]))
            .when_action(option(id))
            .then_error(move |error| {
                assert_eq!(*error, VenueError::DeadlineOutOfRange { reservation_id: id });
            })
            .then_state(move |book| {
                assert_eq!(book.reservation(&id).unwrap().status, ReservationStatus::Request);
                assert_eq!(book.ledger().committed_seats(), 0);
            })
            .run();
    }

    #[test]
    fn test_expiry_notice_precedes_waitlist_offer() {
        let id = ReservationId::new();
        let entry = WaitlistEntryId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                2,
                vec![
                    submit(id, 2),
                    option(id),
                    BookingAction::JoinWaitlist {
                        entry_id: entry,
                        customer_name: "Pair".into(),
                        party_size: 2,
                    },
                ],
            ))
            .when_action(BookingAction::ExpireOption {
                reservation_id: id,
                now: now() + Duration::days(8),
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assert!(matches!(&effects[0], Effect::Sequential(notices) if notices.len() == 2));
                assert_eq!(effects[0].weight(), 2);
            })
            .run();
    }

    #[test]
    fn test_party_size_frozen_while_holding_seats() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2), option(id)]))
            .when_action(BookingAction::ChangePartySize {
                reservation_id: id,
                party_size: 5,
            })
            .then_error(|error| {
                assert!(matches!(error, VenueError::PartySizeFrozen { .. }));
            })
            .then_state(move |book| {
                assert_eq!(book.reservation(&id).unwrap().party_size, 2);
            })
            .run();
    }

    #[test]
    fn test_party_size_changes_before_seats_are_held() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2)]))
            .when_action(BookingAction::ChangePartySize {
                reservation_id: id,
                party_size: 5,
            })
            .then_state(move |book| {
                assert_eq!(book.reservation(&id).unwrap().party_size, 5);
            })
            .run();
    }

    #[test]
    fn test_refund_cannot_exceed_net_paid() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                10,
                vec![
                    submit(id, 2),
                    BookingAction::RecordPayment {
                        reservation_id: id,
                        amount: Money::from_cents(5_000),
                        reference: "PAY-1".into(),
                    },
                ],
            ))
            .when_action(BookingAction::RecordRefund {
                reservation_id: id,
                amount: Money::from_cents(5_001),
                reference: "REF-1".into(),
            })
            .then_error(|error| {
                assert!(matches!(error, VenueError::RefundExceedsBalance { .. }));
            })
            .run();
    }

    #[test]
    fn test_zero_payment_rejected() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 2)]))
            .when_action(BookingAction::RecordPayment {
                reservation_id: id,
                amount: Money::ZERO,
                reference: "PAY-0".into(),
            })
            .then_error(|error| {
                assert_eq!(*error, VenueError::InvalidAmount);
            })
            .run();
    }

    #[test]
    fn test_archive_records_snapshot_once() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                10,
                vec![
                    submit(id, 2),
                    BookingAction::Archive {
                        reservation_id: id,
                        archived_by: "ops".into(),
                        reason: "duplicate".into(),
                    },
                ],
            ))
            .when_action(BookingAction::Archive {
                reservation_id: id,
                archived_by: "ops".into(),
                reason: "again".into(),
            })
            .then_error(move |error| {
                assert_eq!(*error, VenueError::AlreadyArchived { reservation_id: id });
            })
            .then_state(|book| {
                assert_eq!(book.active_reservations().count(), 0);
                assert!(book.changes().archive.is_none());
            })
            .run();
    }

    #[test]
    fn test_set_capacity_below_committed_refused() {
        let id = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(10, vec![submit(id, 6), BookingAction::Confirm { reservation_id: id }]))
            .when_action(BookingAction::SetCapacity { capacity: 5 })
            .then_error(|error| {
                assert!(matches!(error, VenueError::CapacityBelowCommitted { .. }));
            })
            .then_state(|book| {
                assert_eq!(book.event().capacity, 10);
            })
            .run();
    }

    #[test]
    fn test_waitlist_entry_lifecycle() {
        let entry = WaitlistEntryId::new();
        let res = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                10,
                vec![
                    BookingAction::JoinWaitlist {
                        entry_id: entry,
                        customer_name: "Hercule".into(),
                        party_size: 2,
                    },
                    BookingAction::MarkContacted {
                        entry_id: entry,
                        contacted_by: "front desk".into(),
                    },
                    submit(res, 2),
                ],
            ))
            .when_action(BookingAction::MarkConverted {
                entry_id: entry,
                reservation_id: res,
            })
            .then_state(move |book| {
                let e = book.waitlist_entry(&entry).unwrap();
                assert_eq!(e.status, WaitlistStatus::Converted);
                assert_eq!(e.contacted_by.as_deref(), Some("front desk"));
                assert_eq!(e.converted_reservation, Some(res));
            })
            .run();
    }

    #[test]
    fn test_converted_waitlist_entry_is_terminal() {
        let entry = WaitlistEntryId::new();
        let res = ReservationId::new();

        ReducerTest::new(BookingReducer::new())
            .with_env(create_test_env())
            .given_state(book_after(
                10,
                vec![
                    BookingAction::JoinWaitlist {
                        entry_id: entry,
                        customer_name: "Hercule".into(),
                        party_size: 2,
                    },
                    submit(res, 2),
                    BookingAction::MarkConverted {
                        entry_id: entry,
                        reservation_id: res,
                    },
                ],
            ))
            .when_action(BookingAction::CancelWaitlistEntry { entry_id: entry })
            .then_error(|error| {
                assert!(matches!(
                    error,
                    VenueError::InvalidWaitlistTransition {
                        from: WaitlistStatus::Converted,
                        to: WaitlistStatus::Cancelled,
                        ..
                    }
                ));
            })
            .run();
    }

    #[test]
    fn test_load_repairs_committed_seat_cache() {
        let mut event = Event::new("Gala", now() + Duration::days(30), 10, now());
        event.committed_seats = 9;
        let mut held = Reservation::new_request(ReservationId::new(), event.id, "A", 3, Money::ZERO, now());
        held.status = ReservationStatus::Confirmed;
        let request = Reservation::new_request(ReservationId::new(), event.id, "B", 4, Money::ZERO, now());

        let book = EventBook::load(event, [held, request], []);
        assert_eq!(book.ledger().committed_seats(), 3);
        assert_eq!(book.event().committed_seats, 3);
        assert!(book.changes().event_changed);
    }
}
