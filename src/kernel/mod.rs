//! Kernel write path: collaborator interfaces and the constraint-enforcing writer.
//!
//! The kernel composes three collaborators behind traits: [`SchemaRead`] for the
//! schema catalog, [`EntityRead`] for entity state and index lookups, and
//! [`EntityWrite`] for raw mutations. [`ConstraintEnforcingWriter`] wraps a raw
//! writer and rejects mutations that would break a uniqueness constraint.

mod constraint_enforcing;
mod operations;
mod statement;

pub use constraint_enforcing::ConstraintEnforcingWriter;
pub use operations::{EntityRead, EntityWrite, SchemaRead};
pub use statement::Statement;
