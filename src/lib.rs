//! Sombra kernel write path.
//!
//! Enforces uniqueness constraints on node labels and properties under
//! concurrent transactions. [`kernel::ConstraintEnforcingWriter`] wraps a raw
//! entity writer and validates each mutation against the schema catalog,
//! serializing writers of the same value through index-entry locks.
//! [`storage::Graph`] provides an in-memory transactional store implementing
//! every collaborator the writer depends on.

#![warn(missing_docs)]

pub mod kernel;
pub mod logging;
pub mod primitives;
pub mod storage;
pub mod types;
