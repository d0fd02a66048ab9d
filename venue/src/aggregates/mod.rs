//! Aggregates for the venue operations engine.
//!
//! One aggregate, the [`booking::EventBook`], covers an event together with
//! its reservations and waitlist. Every write to an event goes through it,
//! under that event's writer lane.

pub mod booking;

pub use booking::{
    BookingAction, BookingEnvironment, BookingReducer, ChangeLog, EventBook, Promotion, Transition,
};
