//! Event capacity ledger.
//!
//! The ledger is the only authority on whether an event can admit a party.
//! It tracks, per reservation, how many seats that reservation holds, so a
//! release is naturally idempotent: releasing a reservation that holds
//! nothing releases zero seats.
//!
//! **Invariant**: `committed_seats() <= capacity()` after every successful
//! call. `reserve_seats` never reserves partially.

use crate::error::VenueError;
use crate::types::{EventId, ReservationId};
use std::collections::HashMap;

/// Seats committed against one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapacityLedger {
    event_id: EventId,
    capacity: u32,
    committed: u32,
    holds: HashMap<ReservationId, u32>,
}

impl CapacityLedger {
    /// An empty ledger for an event
    #[must_use]
    pub fn new(event_id: EventId, capacity: u32) -> Self {
        Self {
            event_id,
            capacity,
            committed: 0,
            holds: HashMap::new(),
        }
    }

    /// Rebuild a ledger from the seats each reservation holds.
    ///
    /// Stored data is taken as-is, so the rebuilt total may exceed capacity
    /// if storage was inconsistent. Such a ledger admits nothing until seats
    /// are released.
    #[must_use]
    pub fn rebuild(
        event_id: EventId,
        capacity: u32,
        holds: impl IntoIterator<Item = (ReservationId, u32)>,
    ) -> Self {
        let holds: HashMap<_, _> = holds.into_iter().collect();
        let committed = holds.values().fold(0u32, |sum, seats| sum.saturating_add(*seats));
        Self {
            event_id,
            capacity,
            committed,
            holds,
        }
    }

    /// Event this ledger counts for
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Total seats
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Seats currently held
    #[must_use]
    pub const fn committed_seats(&self) -> u32 {
        self.committed
    }

    /// Seats still free
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.committed)
    }

    /// Seats held by one reservation, if any
    #[must_use]
    pub fn held_by(&self, reservation_id: &ReservationId) -> Option<u32> {
        self.holds.get(reservation_id).copied()
    }

    /// Hold `count` seats for a reservation.
    ///
    /// Holding again for a reservation that already holds seats is a no-op.
    ///
    /// # Errors
    ///
    /// - [`VenueError::InvalidPartySize`] when `count` is zero
    /// - [`VenueError::CapacityExceeded`] when the seats are not available;
    ///   nothing is reserved in that case
    pub fn reserve_seats(&mut self, reservation_id: ReservationId, count: u32) -> Result<(), VenueError> {
        if count == 0 {
            return Err(VenueError::InvalidPartySize { party_size: count });
        }
        if self.holds.contains_key(&reservation_id) {
            return Ok(());
        }

        let available = self.available();
        if count > available {
            return Err(VenueError::CapacityExceeded {
                event_id: self.event_id,
                requested: count,
                available,
            });
        }

        self.holds.insert(reservation_id, count);
        self.committed += count;
        Ok(())
    }

    /// Release whatever a reservation holds and return how many seats that was.
    pub fn release_seats(&mut self, reservation_id: &ReservationId) -> u32 {
        let released = self.holds.remove(reservation_id).unwrap_or(0);
        self.committed = self.committed.saturating_sub(released);
        released
    }

    /// Change the total number of seats.
    ///
    /// # Errors
    ///
    /// Returns [`VenueError::CapacityBelowCommitted`] when more seats are
    /// already held than the new capacity allows.
    pub fn set_capacity(&mut self, capacity: u32) -> Result<(), VenueError> {
        if capacity < self.committed {
            return Err(VenueError::CapacityBelowCommitted {
                event_id: self.event_id,
                requested: capacity,
                committed: self.committed,
            });
        }
        self.capacity = capacity;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use venue_ops_testing::properties;

    #[test]
    fn test_reserve_is_all_or_nothing() {
        let mut ledger = CapacityLedger::new(EventId::new(), 10);
        ledger.reserve_seats(ReservationId::new(), 8).unwrap();

        let err = ledger.reserve_seats(ReservationId::new(), 3).unwrap_err();
        assert!(matches!(
            err,
            VenueError::CapacityExceeded {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(ledger.committed_seats(), 8);
    }

    #[test]
    fn test_exact_fit_is_admitted() {
        let mut ledger = CapacityLedger::new(EventId::new(), 4);
        ledger.reserve_seats(ReservationId::new(), 4).unwrap();
        assert_eq!(ledger.available(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut ledger = CapacityLedger::new(EventId::new(), 10);
        let id = ReservationId::new();
        ledger.reserve_seats(id, 3).unwrap();

        assert_eq!(ledger.release_seats(&id), 3);
        assert_eq!(ledger.release_seats(&id), 0);
        assert_eq!(ledger.committed_seats(), 0);
    }

    #[test]
    fn test_reserving_twice_holds_once() {
        let mut ledger = CapacityLedger::new(EventId::new(), 10);
        let id = ReservationId::new();
        ledger.reserve_seats(id, 3).unwrap();
        ledger.reserve_seats(id, 3).unwrap();
        assert_eq!(ledger.committed_seats(), 3);
    }

    #[test]
    fn test_zero_seats_rejected() {
        let mut ledger = CapacityLedger::new(EventId::new(), 10);
        assert!(matches!(
            ledger.reserve_seats(ReservationId::new(), 0),
            Err(VenueError::InvalidPartySize { party_size: 0 })
        ));
    }

    #[test]
    fn test_zero_capacity_admits_nothing() {
        let mut ledger = CapacityLedger::new(EventId::new(), 0);
        assert!(ledger.reserve_seats(ReservationId::new(), 1).is_err());
    }

    #[test]
    fn test_capacity_cannot_shrink_below_committed() {
        let mut ledger = CapacityLedger::new(EventId::new(), 10);
        ledger.reserve_seats(ReservationId::new(), 6).unwrap();

        assert!(matches!(
            ledger.set_capacity(5),
            Err(VenueError::CapacityBelowCommitted {
                requested: 5,
                committed: 6,
                ..
            })
        ));
        ledger.set_capacity(6).unwrap();
        assert_eq!(ledger.available(), 0);
    }

    #[test]
    fn test_rebuild_sums_holds() {
        let ledger = CapacityLedger::rebuild(
            EventId::new(),
            10,
            [(ReservationId::new(), 2), (ReservationId::new(), 5)],
        );
        assert_eq!(ledger.committed_seats(), 7);
        assert_eq!(ledger.available(), 3);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(u32),
        Release(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => properties::party_size().prop_map(Op::Reserve),
            2 => any::<usize>().prop_map(Op::Release),
        ]
    }

    proptest! {
        #[test]
        fn prop_committed_never_exceeds_capacity(
            capacity in properties::capacity(),
            ops in prop::collection::vec(op(), 0..200),
        ) {
            let mut ledger = CapacityLedger::new(EventId::new(), capacity);
            let mut issued: Vec<ReservationId> = Vec::new();
            let mut expected: u64 = 0;

            for op in ops {
                match op {
                    Op::Reserve(seats) => {
                        let id = ReservationId::new();
                        if ledger.reserve_seats(id, seats).is_ok() {
                            expected += u64::from(seats);
                            issued.push(id);
                        }
                    }
                    Op::Release(pick) => {
                        if !issued.is_empty() {
                            let id = issued[pick % issued.len()];
                            expected -= u64::from(ledger.release_seats(&id));
                        }
                    }
                }

                prop_assert!(ledger.committed_seats() <= ledger.capacity());
                prop_assert_eq!(u64::from(ledger.committed_seats()), expected);
            }
        }
    }
}
