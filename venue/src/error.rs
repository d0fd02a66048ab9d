//! Error types for the venue operations engine.

use crate::lifecycle::{ReservationStatus, WaitlistStatus};
use crate::types::{EventId, Money, ReservationId, WaitlistEntryId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the persistence boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A write collided with existing data (for example a duplicate archive).
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// Stored data violates an invariant.
    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

/// What the caller should offer the user after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedAction {
    /// The show is full: offer to put the party on the waitlist.
    OfferWaitlist,
    /// Local state is stale: refresh, re-check, then retry.
    RefreshAndRetry,
    /// The operation already happened; nothing to do.
    AlreadyDone,
    /// Transient infrastructure failure: retry later.
    RetryLater,
    /// The request itself is wrong and must be changed.
    FixRequest,
}

/// Domain errors for reservation lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    /// Admitting the party would overbook the event.
    #[error("Event {event_id} cannot seat {requested} more (available: {available})")]
    CapacityExceeded {
        /// Event that is full
        event_id: EventId,
        /// Seats asked for
        requested: u32,
        /// Seats still free
        available: u32,
    },

    /// The status change is not in the transition table.
    #[error("Reservation {reservation_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Reservation concerned
        reservation_id: ReservationId,
        /// Current status
        from: ReservationStatus,
        /// Requested status
        to: ReservationStatus,
    },

    /// The option deadline has passed.
    #[error("Option on reservation {reservation_id} expired at {expired_at}")]
    OptionExpired {
        /// Reservation concerned
        reservation_id: ReservationId,
        /// When the option lapsed
        expired_at: DateTime<Utc>,
    },

    /// Expiry was requested for an option that is still running.
    #[error("Option on reservation {reservation_id} is active until {expires_at}")]
    OptionStillActive {
        /// Reservation concerned
        reservation_id: ReservationId,
        /// When the option lapses
        expires_at: DateTime<Utc>,
    },

    /// The requested option deadline lies outside the representable calendar.
    #[error("Option deadline for reservation {reservation_id} is out of range")]
    DeadlineOutOfRange {
        /// Reservation concerned
        reservation_id: ReservationId,
    },

    /// An archive record already exists for this reservation.
    #[error("Reservation {reservation_id} is already archived")]
    AlreadyArchived {
        /// Reservation concerned
        reservation_id: ReservationId,
    },

    /// Unknown event.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Unknown reservation.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// Unknown waitlist entry.
    #[error("Waitlist entry not found: {0}")]
    WaitlistEntryNotFound(WaitlistEntryId),

    /// The waitlist status change is not allowed.
    #[error("Waitlist entry {entry_id} cannot move from {from} to {to}")]
    InvalidWaitlistTransition {
        /// Entry concerned
        entry_id: WaitlistEntryId,
        /// Current status
        from: WaitlistStatus,
        /// Requested status
        to: WaitlistStatus,
    },

    /// Party size must be at least one person.
    #[error("Invalid party size: {party_size}")]
    InvalidPartySize {
        /// Rejected size
        party_size: u32,
    },

    /// The party size cannot change while seats are held.
    #[error("Party size of reservation {reservation_id} is frozen while {status}")]
    PartySizeFrozen {
        /// Reservation concerned
        reservation_id: ReservationId,
        /// Current (seat-holding) status
        status: ReservationStatus,
    },

    /// Payment and refund amounts must be positive.
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// A refund larger than what was paid.
    #[error("Refund of {requested} on reservation {reservation_id} exceeds refundable {refundable}")]
    RefundExceedsBalance {
        /// Reservation concerned
        reservation_id: ReservationId,
        /// Refund asked for
        requested: Money,
        /// Net amount paid so far
        refundable: Money,
    },

    /// Capacity cannot drop below the seats already committed.
    #[error("Event {event_id} has {committed} seats committed, cannot set capacity to {requested}")]
    CapacityBelowCommitted {
        /// Event concerned
        event_id: EventId,
        /// Capacity asked for
        requested: u32,
        /// Seats currently held
        committed: u32,
    },

    /// Persistence failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl VenueError {
    /// Whether the caller can reach a good outcome without changing the request.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::CapacityExceeded { .. }
            | Self::OptionExpired { .. }
            | Self::OptionStillActive { .. }
            | Self::AlreadyArchived { .. } => true,
            Self::Repository(err) => {
                matches!(err, RepositoryError::Conflict(_) | RepositoryError::Unavailable(_))
            },
            _ => false,
        }
    }

    /// How the failure should be presented.
    #[must_use]
    pub const fn suggested_action(&self) -> SuggestedAction {
        match self {
            Self::CapacityExceeded { .. } => SuggestedAction::OfferWaitlist,
            Self::OptionExpired { .. }
            | Self::OptionStillActive { .. }
            | Self::InvalidTransition { .. }
            | Self::InvalidWaitlistTransition { .. }
            | Self::Repository(RepositoryError::Conflict(_)) => SuggestedAction::RefreshAndRetry,
            Self::AlreadyArchived { .. } => SuggestedAction::AlreadyDone,
            Self::Repository(RepositoryError::Unavailable(_)) => SuggestedAction::RetryLater,
            Self::EventNotFound(_)
            | Self::ReservationNotFound(_)
            | Self::WaitlistEntryNotFound(_)
            | Self::InvalidPartySize { .. }
            | Self::PartySizeFrozen { .. }
            | Self::InvalidAmount
            | Self::DeadlineOutOfRange { .. }
            | Self::RefundExceedsBalance { .. }
            | Self::CapacityBelowCommitted { .. }
            | Self::Repository(RepositoryError::Corrupt(_)) => SuggestedAction::FixRequest,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, VenueError>;
