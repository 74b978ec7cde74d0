use std::fmt;

use crate::types::{LabelId, PropId};

/// Identity of a property index: the `(label, property)` pair it covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IndexDescriptor {
    /// Label whose nodes are indexed.
    pub label: LabelId,
    /// Property key whose values are indexed.
    pub prop: PropId,
}

impl IndexDescriptor {
    /// Creates a descriptor for `(label, prop)`.
    pub fn new(label: LabelId, prop: PropId) -> Self {
        Self { label, prop }
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":label({})(prop({}))", self.label, self.prop)
    }
}

/// Declared invariant: at most one live node with `label` holds a given value for `prop`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UniquenessConstraint {
    /// Constrained label.
    pub label: LabelId,
    /// Constrained property key.
    pub prop: PropId,
}

impl UniquenessConstraint {
    /// Creates a constraint over `(label, prop)`.
    pub fn new(label: LabelId, prop: PropId) -> Self {
        Self { label, prop }
    }

    /// Descriptor of the index that enforces this constraint.
    pub fn index(&self) -> IndexDescriptor {
        IndexDescriptor::new(self.label, self.prop)
    }
}

impl fmt::Display for UniquenessConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unique(label({}), prop({}))", self.label, self.prop)
    }
}

/// Lifecycle state of an index.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum IndexState {
    /// Fully built; lookups are trustworthy.
    Online,
    /// Under construction; lookups must not be used for enforcement.
    Populating,
    /// Build failed; a failure description is stored alongside.
    Failed,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexState::Online => f.write_str("ONLINE"),
            IndexState::Populating => f.write_str("POPULATING"),
            IndexState::Failed => f.write_str("FAILED"),
        }
    }
}
