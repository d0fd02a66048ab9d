//! Venue Ops - reservation lifecycle engine for a dinner-theater venue
//!
//! Shows have a fixed number of seats. Parties book through a request, an
//! optional time-boxed option, and a confirmation, with cancellation,
//! rejection, a waitlist and check-in on the side. The engine guarantees
//! that an event is never overbooked, even when many writers race.
//!
//! # Architecture
//!
//! ```text
//!   VenueService ──► WriterLanes<EventId> (one writer per event)
//!        │
//!        ▼
//!   EventBook ◄── BookingReducer ── BookingAction
//!    │  ├─ CapacityLedger        (seat accounting)
//!    │  ├─ ReservationStatus     (transition table)
//!    │  └─ waitlist policy       (who gets released seats)
//!    ▼
//!   ChangeSet ──► VenueRepository::commit (atomic)
//!        │
//!        ▼
//!   Effects ──► Notifier (after commit, failures only logged)
//! ```
//!
//! # Key Features
//!
//! ## 1. Capacity is checked and taken in one step
//!
//! `committed + party_size <= capacity` is evaluated and the seats are held
//! inside the same reduce call, under the event's writer lane. Two parties
//! racing for the last seat cannot both win.
//!
//! ## 2. Options lapse on their own
//!
//! [`VenueService::process_expired_options`] cancels every option whose
//! deadline has passed, releases the seats and surfaces the oldest waitlist
//! party that fits. One failing item never aborts the sweep.
//!
//! ## 3. Payment urgency and archival
//!
//! [`deadline`] classifies how pressing an outstanding payment is;
//! [`archive`] freezes a reservation and its money history into an
//! immutable record.

pub mod aggregates;
pub mod archive;
pub mod config;
pub mod deadline;
pub mod error;
pub mod expiry;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod notify;
pub mod repository;
pub mod service;
pub mod types;
pub mod waitlist;

pub use aggregates::{BookingAction, BookingEnvironment, BookingReducer, EventBook};
pub use config::VenueConfig;
pub use error::{RepositoryError, Result, SuggestedAction, VenueError};
pub use memory::InMemoryVenueRepository;
pub use repository::{ChangeSet, VenueRepository};
pub use service::{BulkCommand, BulkResult, CancelOutcome, PaymentReminder, VenueService};
pub use types::{Event, EventId, Money, Reservation, ReservationId, WaitlistEntry, WaitlistEntryId};
