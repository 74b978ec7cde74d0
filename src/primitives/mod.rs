//! Low-level primitives shared by the storage engine and the kernel.

/// Concurrency primitives and synchronization.
///
/// Index-entry locks that serialize writers of the same constrained value.
pub mod concurrency;
