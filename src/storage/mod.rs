//! Graph storage: entity state, schema catalog and property indexes.
//!
//! The in-memory [`Graph`] is a transactional store implementing every
//! collaborator the kernel write path depends on.

/// Property index catalog, lifecycle states and canonical value keys.
pub mod index;

mod graph;
mod metrics;
mod options;
mod types;

/// Transactional in-memory graph store.
pub use graph::{Graph, Transaction};

/// Metrics for the constraint-enforcing write path.
pub use metrics::{default_metrics, ConstraintMetrics, CounterMetrics, NoopMetrics};

/// Kernel configuration options.
pub use options::KernelOptions;

/// Property values and entity snapshots.
pub use types::{ArrayValue, EdgeData, NodeData, PropEntry, PropValueOwned, Property};
