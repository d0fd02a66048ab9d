//! Archival reconciliation.
//!
//! Archiving takes a one-time snapshot of a reservation and folds its
//! payment and refund history into a frozen [`Financials`] block. The
//! resulting [`ArchivedRecord`] exposes no mutators.

use crate::error::VenueError;
use crate::types::{Money, PaymentRecord, Reservation, ReservationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Money totals frozen at archive time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financials {
    /// Agreed price
    pub total_price: Money,
    /// Sum of payments
    pub total_paid: Money,
    /// Sum of refunds
    pub total_refunded: Money,
    /// Paid minus refunded, never below zero
    pub net_revenue: Money,
    /// At least one refund was issued
    pub has_refunds: bool,
    /// Everything paid was given back (and something was paid)
    pub is_fully_refunded: bool,
    /// Net revenue is below the price
    pub has_outstanding_balance: bool,
}

/// Fold a reservation's payment history into its financials.
#[must_use]
pub fn reconcile(reservation: &Reservation) -> Financials {
    let total_paid = reservation.total_paid();
    let total_refunded = reservation.total_refunded();
    let net_revenue = total_paid.saturating_sub(total_refunded);

    Financials {
        total_price: reservation.total_price,
        total_paid,
        total_refunded,
        net_revenue,
        has_refunds: !reservation.refunds.is_empty(),
        is_fully_refunded: total_refunded >= total_paid && !total_paid.is_zero(),
        has_outstanding_balance: net_revenue < reservation.total_price,
    }
}

/// Immutable audit record of an archived reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedRecord {
    snapshot: Reservation,
    financials: Financials,
    archived_at: DateTime<Utc>,
    archived_by: String,
    archive_reason: String,
    payment_references: Vec<String>,
    refund_references: Vec<String>,
}

impl ArchivedRecord {
    /// Id of the reservation this record was taken from
    #[must_use]
    pub const fn id(&self) -> ReservationId {
        self.snapshot.id
    }

    /// Reservation fields as they were at archive time
    #[must_use]
    pub const fn snapshot(&self) -> &Reservation {
        &self.snapshot
    }

    /// Frozen totals
    #[must_use]
    pub const fn financials(&self) -> &Financials {
        &self.financials
    }

    /// When the record was written
    #[must_use]
    pub const fn archived_at(&self) -> DateTime<Utc> {
        self.archived_at
    }

    /// Who archived the reservation
    #[must_use]
    pub fn archived_by(&self) -> &str {
        &self.archived_by
    }

    /// Why it was archived
    #[must_use]
    pub fn archive_reason(&self) -> &str {
        &self.archive_reason
    }

    /// Payments, in the order received
    #[must_use]
    pub fn payments(&self) -> &[PaymentRecord] {
        &self.snapshot.payments
    }

    /// Refunds, in the order issued
    #[must_use]
    pub fn refunds(&self) -> &[PaymentRecord] {
        &self.snapshot.refunds
    }

    /// Payment references, for search
    #[must_use]
    pub fn payment_references(&self) -> &[String] {
        &self.payment_references
    }

    /// Refund references, for search
    #[must_use]
    pub fn refund_references(&self) -> &[String] {
        &self.refund_references
    }
}

/// Snapshot a reservation into an archive record.
///
/// # Errors
///
/// Returns [`VenueError::AlreadyArchived`] if the reservation carries an
/// archive timestamp already.
pub fn archive(
    reservation: &Reservation,
    archived_by: impl Into<String>,
    reason: impl Into<String>,
    now: DateTime<Utc>,
) -> Result<ArchivedRecord, VenueError> {
    if reservation.is_archived() {
        return Err(VenueError::AlreadyArchived {
            reservation_id: reservation.id,
        });
    }

    let mut snapshot = reservation.clone();
    snapshot.archived_at = Some(now);

    Ok(ArchivedRecord {
        financials: reconcile(reservation),
        payment_references: reservation.payments.iter().map(|p| p.reference.clone()).collect(),
        refund_references: reservation.refunds.iter().map(|r| r.reference.clone()).collect(),
        snapshot,
        archived_at: now,
        archived_by: archived_by.into(),
        archive_reason: reason.into(),
    })
}

/// Totals across archived records
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Number of records
    pub records: usize,
    /// Sum of payments
    pub total_paid: Money,
    /// Sum of refunds
    pub total_refunded: Money,
    /// Sum of net revenue
    pub net_revenue: Money,
    /// Records with an outstanding balance
    pub with_outstanding_balance: usize,
    /// Records that were fully refunded
    pub fully_refunded: usize,
}

/// Add up the financials of archived records.
#[must_use]
pub fn archive_summary<'a>(records: impl IntoIterator<Item = &'a ArchivedRecord>) -> ArchiveSummary {
    records
        .into_iter()
        .fold(ArchiveSummary::default(), |mut summary, record| {
            let f = record.financials();
            summary.records += 1;
            summary.total_paid = summary.total_paid.saturating_add(f.total_paid);
            summary.total_refunded = summary.total_refunded.saturating_add(f.total_refunded);
            summary.net_revenue = summary.net_revenue.saturating_add(f.net_revenue);
            summary.with_outstanding_balance += usize::from(f.has_outstanding_balance);
            summary.fully_refunded += usize::from(f.is_fully_refunded);
            summary
        })
}
