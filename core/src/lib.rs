//! # Venue Ops Core
//!
//! Core traits and types for the venue operations engine.
//!
//! Business rules are written as reducers: pure functions that validate an
//! action against the current state, mutate the state in place and describe
//! the side effects that should follow. The imperative shell (the service
//! layer and the runtime crate) persists the state and executes the effects.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for one aggregate (for example one show and its bookings)
//! - **Action**: All possible inputs to a reducer (commands and the events they produce)
//! - **Reducer**: `(State, Action, Environment) → Result<Effects, Rejection>`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use venue_ops_core::*;
//!
//! impl Reducer for SeatCounterReducer {
//!     type State = SeatCounter;
//!     type Action = SeatAction;
//!     type Environment = SeatEnvironment;
//!     type Error = SeatError;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SeatCounter,
//!         action: SeatAction,
//!         env: &SeatEnvironment,
//!     ) -> Result<SmallVec<[Effect<SeatAction>; 4]>, SeatError> {
//!         // Validate, apply, describe effects
//!         Ok(SmallVec::new())
//!     }
//! }
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Declarative macros for effect construction
pub mod effect_macros;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<Effects, Error>`.
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Error`: The typed rejection returned when an action is refused
    ///
    /// # Contract
    ///
    /// When `reduce` returns `Err`, the state must be exactly as it was before
    /// the call. Validation therefore happens before any mutation.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Rejection reported to the caller when an action is refused
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is not legal in the current
        /// state. Nothing has been mutated in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Effect<Self::Action>; 4]>, Self::Error>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are values returned from reducers. They are executed by the
/// runtime after the state change they belong to has been persisted.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back to the
        /// owner of the reducer as a follow-up.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Number of leaf effects that actually do something
        #[must_use]
        pub fn weight(&self) -> usize {
            match self {
                Effect::None => 0,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().map(Effect::weight).sum()
                },
                Effect::Future(_) => 1,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All ambient inputs (time in particular) are abstracted behind traits and
/// injected via the Environment parameter so reducers stay deterministic.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Business rules never read the system time directly; the current
    /// instant is always obtained through an injected `Clock`.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
