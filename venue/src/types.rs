//! Domain types for the venue operations engine.
//!
//! Identifiers, money, and the three persisted entities: [`Event`],
//! [`Reservation`] and [`WaitlistEntry`].

use crate::lifecycle::{ReservationStatus, WaitlistStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event (one show)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation
///
/// Archived records reuse the id of the reservation they were taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a waitlist entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WaitlistEntryId(Uuid);

impl WaitlistEntryId {
    /// Creates a new random `WaitlistEntryId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `WaitlistEntryId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WaitlistEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WaitlistEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Money amount in cents
///
/// Amounts are never negative; subtraction is either checked or saturating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates money from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates money from whole currency units
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Whether the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, `None` on overflow
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Subtracts, `None` if the result would be negative
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Subtracts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Adds, clamping at the maximum representable amount
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

/// Derived payment status of a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Net paid amount is below the total price
    Pending,
    /// Net paid amount covers the total price
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
        }
    }
}

/// One payment or refund line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Amount moved
    pub amount: Money,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
    /// External reference (invoice number, bank transfer id, ...)
    pub reference: String,
}

/// Why a reservation was cancelled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationCause {
    /// Explicit cancel by staff or customer
    Requested,
    /// The option ran past its expiry and was swept
    Expired,
}

/// Cancellation details recorded on the reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Cause of the cancellation
    pub cause: CancellationCause,
    /// Free-form reason, if one was given
    pub reason: Option<String>,
    /// When the cancellation happened
    pub at: DateTime<Utc>,
}

// ============================================================================
// Entities
// ============================================================================

/// A show with finite seating
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Date and time the show starts
    pub starts_at: DateTime<Utc>,
    /// Total seats
    pub capacity: u32,
    /// Seats held by reservations, as last written by the capacity ledger
    ///
    /// This is a cache. It is rebuilt from the seat-holding reservations
    /// whenever the event is loaded for a write.
    pub committed_seats: u32,
    /// When the event was created
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new event with no seats committed
    #[must_use]
    pub fn new(name: impl Into<String>, starts_at: DateTime<Utc>, capacity: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            name: name.into(),
            starts_at,
            capacity,
            committed_seats: 0,
            created_at: now,
        }
    }
}

/// A booking against one event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Event this reservation books
    pub event_id: EventId,
    /// Name the booking is under
    pub customer_name: String,
    /// Number of persons
    pub party_size: u32,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Agreed price for the whole party
    pub total_price: Money,
    /// Option deadline, present only while the status is `Pending`
    pub option_expires_at: Option<DateTime<Utc>>,
    /// When the option was granted
    pub option_placed_at: Option<DateTime<Utc>>,
    /// Payments received, in order
    pub payments: Vec<PaymentRecord>,
    /// Refunds issued, in order
    pub refunds: Vec<PaymentRecord>,
    /// Cancellation details
    pub cancellation: Option<Cancellation>,
    /// Why the request was rejected
    pub rejection_reason: Option<String>,
    /// Arrival time at the venue
    pub checked_in_at: Option<DateTime<Utc>>,
    /// When the reservation was archived
    pub archived_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates a fresh booking request
    #[must_use]
    pub fn new_request(
        id: ReservationId,
        event_id: EventId,
        customer_name: impl Into<String>,
        party_size: u32,
        total_price: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            customer_name: customer_name.into(),
            party_size,
            status: ReservationStatus::Request,
            total_price,
            option_expires_at: None,
            option_placed_at: None,
            payments: Vec::new(),
            refunds: Vec::new(),
            cancellation: None,
            rejection_reason: None,
            checked_in_at: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of all payments
    #[must_use]
    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Sum of all refunds
    #[must_use]
    pub fn total_refunded(&self) -> Money {
        self.refunds.iter().map(|r| r.amount).sum()
    }

    /// Payments minus refunds
    #[must_use]
    pub fn net_paid(&self) -> Money {
        self.total_paid().saturating_sub(self.total_refunded())
    }

    /// `Paid` once the net paid amount covers the total price
    #[must_use]
    pub fn payment_status(&self) -> PaymentStatus {
        if self.net_paid() >= self.total_price {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        }
    }

    /// What is still owed
    #[must_use]
    pub fn outstanding_balance(&self) -> Money {
        self.total_price.saturating_sub(self.net_paid())
    }

    /// What was paid beyond the total price
    #[must_use]
    pub fn credit(&self) -> Money {
        self.net_paid().saturating_sub(self.total_price)
    }

    /// Whether this reservation currently counts against capacity
    #[must_use]
    pub const fn holds_seats(&self) -> bool {
        self.status.holds_seats()
    }

    /// Whether an archive record exists for this reservation
    #[must_use]
    pub const fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Whether the option deadline lies strictly before `now`
    #[must_use]
    pub fn option_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending
            && self.option_expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// Someone waiting for seats to free up on a sold-out event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// Entry identifier
    pub id: WaitlistEntryId,
    /// Event waited on
    pub event_id: EventId,
    /// Name the entry is under
    pub customer_name: String,
    /// Requested number of persons
    pub party_size: u32,
    /// Entry status
    pub status: WaitlistStatus,
    /// Position in the queue is decided by this timestamp
    pub created_at: DateTime<Utc>,
    /// When staff reached out
    pub contacted_at: Option<DateTime<Utc>>,
    /// Who reached out
    pub contacted_by: Option<String>,
    /// Reservation created for this entry
    pub converted_reservation: Option<ReservationId>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Creates a pending entry
    #[must_use]
    pub fn new(
        id: WaitlistEntryId,
        event_id: EventId,
        customer_name: impl Into<String>,
        party_size: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            customer_name: customer_name.into(),
            party_size,
            status: WaitlistStatus::Pending,
            created_at: now,
            contacted_at: None,
            contacted_by: None,
            converted_reservation: None,
            updated_at: now,
        }
    }
}
