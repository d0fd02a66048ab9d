//! Outbound notification sink.
//!
//! Notifications are fire-and-forget: they are sent after the state change
//! that triggered them has been committed, and a delivery failure is logged
//! and counted but never undoes that change.

use crate::types::{EventId, ReservationId, WaitlistEntryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Something the outside world should hear about
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// An option lapsed and was cancelled by the sweep
    OptionExpired {
        /// Reservation cancelled
        reservation_id: ReservationId,
        /// Event it was for
        event_id: EventId,
        /// Seats returned to the event
        released_seats: u32,
        /// When the option lapsed
        expired_at: DateTime<Utc>,
    },
    /// A reservation was confirmed
    ReservationConfirmed {
        /// Reservation confirmed
        reservation_id: ReservationId,
        /// Event it is for
        event_id: EventId,
        /// Party size
        party_size: u32,
    },
    /// Seats freed up that fit a waiting party
    WaitlistSlotAvailable {
        /// Candidate entry
        entry_id: WaitlistEntryId,
        /// Event with free seats
        event_id: EventId,
        /// Size of the waiting party
        party_size: u32,
        /// Seats released
        released_seats: u32,
    },
}

impl Notification {
    /// Short name for logs and metric labels
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OptionExpired { .. } => "option_expired",
            Self::ReservationConfirmed { .. } => "reservation_confirmed",
            Self::WaitlistSlotAvailable { .. } => "waitlist_slot_available",
        }
    }
}

/// Delivery failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Notification sink
///
/// Returns a boxed future so the trait stays dyn-compatible.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails.
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            let payload = serde_json::to_string(&notification)
                .map_err(|e| NotifyError(e.to_string()))?;
            tracing::info!(kind = notification.kind(), %payload, "Notification");
            Ok(())
        })
    }
}

/// Keeps every notification in memory, optionally failing delivery
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: bool,
}

impl RecordingNotifier {
    /// A notifier that records and succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records every attempt and then reports failure
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            failing: true,
        }
    }

    /// Everything passed to `notify` so far
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notification);
            if self.failing {
                Err(NotifyError("recording notifier set to fail".to_string()))
            } else {
                Ok(())
            }
        })
    }
}
