//! # Venue Ops Runtime
//!
//! The imperative shell around the pure reducers in `venue-ops-core`.
//!
//! - [`lanes::WriterLanes`]: one async writer lane per key, so every mutation
//!   of a given show is serialized while different shows proceed in parallel
//! - [`executor`]: runs the effect descriptions returned by reducers and
//!   collects the follow-up actions they produce
//! - [`metrics`]: Prometheus exporter and runtime metric descriptions

/// Prometheus metrics export
pub mod metrics;

/// Per-key writer lanes
pub mod lanes {
    use std::collections::HashMap;
    use std::fmt;
    use std::hash::Hash;
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

    type LaneTable<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

    /// Hands out exclusive, per-key write access.
    ///
    /// Acquiring the lane for a key waits until every earlier holder of the
    /// same key has dropped its [`LaneGuard`]. Lanes for distinct keys never
    /// contend with each other. A lane is removed from the table when its
    /// last holder releases it with nobody waiting, so the table only holds
    /// keys that are in use.
    pub struct WriterLanes<K>
    where
        K: Eq + Hash,
    {
        lanes: LaneTable<K>,
    }

    impl<K> WriterLanes<K>
    where
        K: Eq + Hash + Clone + fmt::Display,
    {
        /// Create an empty lane table
        #[must_use]
        pub fn new() -> Self {
            Self {
                lanes: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        /// Wait for exclusive access to the lane of `key`.
        #[tracing::instrument(skip(self, key), fields(key = %key), name = "lane_acquire")]
        pub async fn acquire(&self, key: &K) -> LaneGuard<K> {
            let lane = {
                let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
                Arc::clone(
                    lanes
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
                )
            };

            let guard = lane.lock_owned().await;
            ::metrics::counter!("venue_lane_acquisitions_total").increment(1);
            tracing::trace!("Acquired writer lane");

            LaneGuard {
                key: key.clone(),
                lanes: Arc::clone(&self.lanes),
                guard,
            }
        }

        /// Number of keys currently held or waited on
        #[must_use]
        pub fn len(&self) -> usize {
            self.lanes.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Whether no lane is in use
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl<K> Default for WriterLanes<K>
    where
        K: Eq + Hash + Clone + fmt::Display,
    {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<K> Clone for WriterLanes<K>
    where
        K: Eq + Hash,
    {
        fn clone(&self) -> Self {
            Self {
                lanes: Arc::clone(&self.lanes),
            }
        }
    }

    impl<K> fmt::Debug for WriterLanes<K>
    where
        K: Eq + Hash,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("WriterLanes").finish_non_exhaustive()
        }
    }

    /// Exclusive access to one lane, released on drop
    #[must_use = "the lane is released as soon as the guard is dropped"]
    pub struct LaneGuard<K>
    where
        K: Eq + Hash,
    {
        key: K,
        lanes: LaneTable<K>,
        guard: OwnedMutexGuard<()>,
    }

    impl<K> LaneGuard<K>
    where
        K: Eq + Hash,
    {
        /// Key this guard holds the lane for
        pub const fn key(&self) -> &K {
            &self.key
        }
    }

    impl<K> Drop for LaneGuard<K>
    where
        K: Eq + Hash,
    {
        fn drop(&mut self) {
            let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the table and this guard still reference the lane: nobody is waiting
            if Arc::strong_count(OwnedMutexGuard::mutex(&self.guard)) == 2 {
                lanes.remove(&self.key);
            }
        }
    }

    impl<K> fmt::Debug for LaneGuard<K>
    where
        K: Eq + Hash + fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("LaneGuard").field("key", &self.key).finish()
        }
    }
}

/// Effect execution
///
/// Effects are executed after the state change that produced them has been
/// committed. Execution is awaited so callers observe completed side effects
/// when their operation returns.
pub mod executor {
    use futures::future::{join_all, BoxFuture, FutureExt};
    use venue_ops_core::effect::Effect;

    /// Execute one effect tree and collect the actions it feeds back.
    ///
    /// `Parallel` children run concurrently, `Sequential` children run in
    /// order. Feedback actions are returned in tree order either way.
    pub fn execute<A>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>>
    where
        A: Send + 'static,
    {
        async move {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    ::metrics::counter!("venue_effects_executed_total", "type" => "none")
                        .increment(1);
                    Vec::new()
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    ::metrics::counter!("venue_effects_executed_total", "type" => "future")
                        .increment(1);
                    fut.await.into_iter().collect()
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    ::metrics::counter!("venue_effects_executed_total", "type" => "parallel")
                        .increment(1);
                    join_all(effects.into_iter().map(execute))
                        .await
                        .into_iter()
                        .flatten()
                        .collect()
                },
                Effect::Sequential(effects) => {
                    let effect_count = effects.len();
                    tracing::trace!("Executing Effect::Sequential with {} effects", effect_count);
                    ::metrics::counter!("venue_effects_executed_total", "type" => "sequential")
                        .increment(1);
                    let mut produced = Vec::new();
                    for (idx, effect) in effects.into_iter().enumerate() {
                        tracing::trace!(
                            "Executing sequential effect {} of {}",
                            idx + 1,
                            effect_count
                        );
                        produced.extend(execute(effect).await);
                    }
                    produced
                },
            }
        }
        .boxed()
    }

    /// Execute every effect returned by one reducer call.
    pub async fn execute_all<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        join_all(effects.into_iter().map(execute))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

pub use executor::{execute, execute_all};
pub use lanes::{LaneGuard, WriterLanes};
