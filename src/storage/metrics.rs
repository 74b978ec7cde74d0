use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::storage::index::IndexState;

/// Trait for tracking outcomes of uniqueness validation on the write path.
///
/// Implementations receive one call per validation outcome, plus one call per
/// index-entry lock granted, and can be used for monitoring contention and
/// rejection rates.
pub trait ConstraintMetrics: Send + Sync {
    /// Records a validation that found no conflicting node.
    fn validation_passed(&self);

    /// Records a validation rejected because another node holds the value.
    fn uniqueness_violation(&self);

    /// Records a validation rejected because the backing index was not online.
    ///
    /// # Parameters
    /// * `state` - The state the index was found in (`Populating` or `Failed`).
    fn index_not_online(&self, state: IndexState);

    /// Records a validation that could not determine an outcome.
    fn unable_to_validate(&self);

    /// Records an index-entry lock granted to the validating transaction.
    fn lock_acquired(&self);
}

/// A no-op implementation of [`ConstraintMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl ConstraintMetrics for NoopMetrics {
    fn validation_passed(&self) {}
    fn uniqueness_violation(&self) {}
    fn index_not_online(&self, _state: IndexState) {}
    fn unable_to_validate(&self) {}
    fn lock_acquired(&self) {}
}

/// A thread-safe counter-based implementation of [`ConstraintMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of validations that passed.
    pub validations_passed: AtomicU64,

    /// Number of uniqueness violations detected.
    pub uniqueness_violations: AtomicU64,

    /// Number of validations rejected on a populating index.
    pub rejected_populating: AtomicU64,

    /// Number of validations rejected on a failed index.
    pub rejected_failed: AtomicU64,

    /// Number of validations that could not determine an outcome.
    pub unable_to_validate: AtomicU64,

    /// Number of index-entry locks granted.
    pub locks_acquired: AtomicU64,
}

impl CounterMetrics {
    /// Loads a counter with relaxed ordering.
    pub fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

impl ConstraintMetrics for CounterMetrics {
    fn validation_passed(&self) {
        self.validations_passed.fetch_add(1, Ordering::Relaxed);
    }

    fn uniqueness_violation(&self) {
        self.uniqueness_violations.fetch_add(1, Ordering::Relaxed);
    }

    fn index_not_online(&self, state: IndexState) {
        match state {
            IndexState::Populating => {
                self.rejected_populating.fetch_add(1, Ordering::Relaxed);
            }
            IndexState::Failed => {
                self.rejected_failed.fetch_add(1, Ordering::Relaxed);
            }
            IndexState::Online => {}
        }
    }

    fn unable_to_validate(&self) {
        self.unable_to_validate.fetch_add(1, Ordering::Relaxed);
    }

    fn lock_acquired(&self) {
        self.locks_acquired.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn ConstraintMetrics> {
    Arc::new(NoopMetrics)
}
