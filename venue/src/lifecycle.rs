//! Reservation and waitlist status machines.
//!
//! The transition tables are exhaustive matches, so adding a status forces
//! every table to be revisited.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a reservation
///
/// ```text
/// request ──► pending ──► confirmed ──► checked-in
///    │           │            │
///    │           └──► cancelled ◄──┘
///    ├──► confirmed
///    ├──► rejected
///    └──► waitlist ──► confirmed | cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationStatus {
    /// Submitted, no seats held
    Request,
    /// An option: seats held until `option_expires_at`
    Pending,
    /// Booked, seats held
    Confirmed,
    /// Arrived on the day, seats held
    CheckedIn,
    /// Waiting for capacity, no seats held
    #[serde(rename = "waitlist")]
    Waitlisted,
    /// Cancelled explicitly or by option expiry
    Cancelled,
    /// Turned down
    Rejected,
}

impl ReservationStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 7] = [
        Self::Request,
        Self::Pending,
        Self::Confirmed,
        Self::CheckedIn,
        Self::Waitlisted,
        Self::Cancelled,
        Self::Rejected,
    ];

    /// Whether a reservation in this status counts against capacity
    #[must_use]
    pub const fn holds_seats(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::CheckedIn)
    }

    /// Whether no further status change is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::CheckedIn | Self::Cancelled | Self::Rejected)
    }

    /// Legal transitions
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        match self {
            Self::Request => matches!(
                to,
                Self::Pending | Self::Confirmed | Self::Rejected | Self::Waitlisted
            ),
            Self::Pending => matches!(to, Self::Confirmed | Self::Cancelled),
            Self::Confirmed => matches!(to, Self::CheckedIn | Self::Cancelled),
            Self::Waitlisted => matches!(to, Self::Confirmed | Self::Cancelled),
            Self::CheckedIn | Self::Cancelled | Self::Rejected => false,
        }
    }

    /// Stable lowercase name, used for logs and metric labels
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked-in",
            Self::Waitlisted => "waitlist",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a waitlist entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    /// Waiting
    Pending,
    /// Staff reached out about a freed block
    Contacted,
    /// Turned into a reservation
    Converted,
    /// Timed out
    Expired,
    /// Withdrawn
    Cancelled,
}

impl WaitlistStatus {
    /// Whether no further status change is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Converted | Self::Expired | Self::Cancelled)
    }

    /// Legal transitions
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        match self {
            Self::Pending => matches!(
                to,
                Self::Contacted | Self::Converted | Self::Expired | Self::Cancelled
            ),
            Self::Contacted => matches!(to, Self::Converted | Self::Expired | Self::Cancelled),
            Self::Converted | Self::Expired | Self::Cancelled => false,
        }
    }

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contacted => "contacted",
            Self::Converted => "converted",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
