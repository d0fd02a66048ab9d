//! Payment deadline classification.
//!
//! Payment is due a fixed number of days before the event, at the end of
//! that day (UTC). Urgency is derived from the whole days left until the
//! deadline, rounded up. All functions take `now` explicitly.

use crate::types::PaymentStatus;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// How pressing an outstanding payment is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentUrgency {
    /// Paid, or the deadline is comfortably far away
    Safe,
    /// Deadline within the reminder window
    Reminder,
    /// Deadline within the urgent window
    Urgent,
    /// Deadline has passed
    Overdue,
}

impl PaymentUrgency {
    /// Higher is more pressing
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Safe => 0,
            Self::Reminder => 1,
            Self::Urgent => 2,
            Self::Overdue => 3,
        }
    }
}

impl fmt::Display for PaymentUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Safe => "safe",
            Self::Reminder => "reminder",
            Self::Urgent => "urgent",
            Self::Overdue => "overdue",
        };
        f.write_str(label)
    }
}

/// Thresholds for payment urgency
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlinePolicy {
    /// Payment is due this many days before the event
    pub deadline_days: u32,
    /// At most this many days left is urgent
    pub urgent_within_days: u32,
    /// At most this many days left earns a reminder
    pub reminder_within_days: u32,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self {
            deadline_days: 7,
            urgent_within_days: 3,
            reminder_within_days: 7,
        }
    }
}

/// Classification with the numbers behind it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineAssessment {
    /// Derived urgency
    pub urgency: PaymentUrgency,
    /// End of the last day payment is accepted without chasing
    pub deadline: DateTime<Utc>,
    /// Whole days until the deadline, rounded up (negative once passed)
    pub days_until_deadline: i64,
}

impl DeadlinePolicy {
    /// End of the day `deadline_days` before the event
    ///
    /// Saturates at the calendar bounds instead of overflowing.
    #[must_use]
    pub fn payment_deadline(&self, event_date: DateTime<Utc>) -> DateTime<Utc> {
        let due_day = event_date
            .checked_sub_signed(Duration::days(i64::from(self.deadline_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
            .date_naive();
        let start_of_day = due_day.and_time(NaiveTime::MIN).and_utc();
        start_of_day
            .checked_add_signed(Duration::milliseconds(DAY_MILLIS - 1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// `ceil((deadline - now) / 1 day)`
    #[must_use]
    pub fn days_until_deadline(&self, event_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let millis = (self.payment_deadline(event_date) - now).num_milliseconds();
        -(-millis).div_euclid(DAY_MILLIS)
    }

    /// Classify the payment urgency for a reservation on `event_date`.
    #[must_use]
    pub fn classify(
        &self,
        event_date: DateTime<Utc>,
        payment_status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> PaymentUrgency {
        self.assess(event_date, payment_status, now).urgency
    }

    /// Classify and report the deadline used.
    #[must_use]
    pub fn assess(
        &self,
        event_date: DateTime<Utc>,
        payment_status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> DeadlineAssessment {
        let deadline = self.payment_deadline(event_date);
        let days_until_deadline = self.days_until_deadline(event_date, now);

        let urgency = if payment_status == PaymentStatus::Paid {
            PaymentUrgency::Safe
        } else if days_until_deadline < 0 {
            PaymentUrgency::Overdue
        } else if days_until_deadline <= i64::from(self.urgent_within_days) {
            PaymentUrgency::Urgent
        } else if days_until_deadline <= i64::from(self.reminder_within_days) {
            PaymentUrgency::Reminder
        } else {
            PaymentUrgency::Safe
        };

        DeadlineAssessment {
            urgency,
            deadline,
            days_until_deadline,
        }
    }
}

/// Classify with the default 7/3/7 day policy.
#[must_use]
pub fn classify(
    event_date: DateTime<Utc>,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> PaymentUrgency {
    DeadlinePolicy::default().classify(event_date, payment_status, now)
}
