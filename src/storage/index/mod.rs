#![forbid(unsafe_code)]

mod catalog;
mod key;
mod types;

pub use catalog::{
    visible_indexes, IndexKind, PropertyIndex, SchemaCatalog, SchemaOverlay, VisibleIndex,
};
pub use key::ValueKey;
pub use types::{IndexDescriptor, IndexState, UniquenessConstraint};
