//! Identifier newtypes and the crate-wide error type.

use std::fmt;

use crate::primitives::concurrency::IndexEntryLock;
use crate::storage::index::IndexDescriptor;
use crate::storage::PropValueOwned;

/// Identifier of a node.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub u64);
/// Identifier of a relationship.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EdgeId(pub u64);
/// Interned label identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LabelId(pub u32);
/// Interned relationship type identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TypeId(pub u32);
/// Interned property key identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PropId(pub u32);
/// Identifier of a transaction; every statement, lock and overlay is scoped to one.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TxId(pub u64);

/// Kind of entity an operation targeted.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EntityKind {
    /// A node.
    Node,
    /// A relationship.
    Relationship,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => f.write_str("node"),
            EntityKind::Relationship => f.write_str("relationship"),
        }
    }
}

/// Errors surfaced by the kernel write path and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum SombraError {
    /// Underlying I/O failure (configuration files).
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Caller supplied an argument the kernel cannot act on.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// The target entity does not exist, or was deleted concurrently.
    #[error("{kind} {id} not found")]
    EntityNotFound {
        /// Entity kind that was addressed.
        kind: EntityKind,
        /// Raw identifier that was addressed.
        id: u64,
    },
    /// No index is registered for the descriptor.
    #[error("no index for {0}")]
    IndexNotFound(IndexDescriptor),
    /// Another transaction committed a change to the same entity first.
    #[error("{kind} {id} was modified by a concurrent transaction")]
    WriteConflict {
        /// Entity kind that was addressed.
        kind: EntityKind,
        /// Raw identifier that was addressed.
        id: u64,
    },
    /// The transaction already committed or rolled back.
    #[error("transaction {0} is not active")]
    TransactionClosed(TxId),
    /// The lock manager gave up waiting for an index-entry lock.
    #[error("timed out after {waited_ms} ms waiting for {lock}")]
    LockTimeout {
        /// Lock that could not be acquired.
        lock: IndexEntryLock,
        /// Milliseconds spent waiting.
        waited_ms: u64,
    },
    /// A uniqueness constraint rejected the mutation, or could not be checked.
    #[error("constraint validation failed: {0}")]
    ConstraintValidation(#[from] ConstraintValidationError),
    /// Options could not be parsed.
    #[error("configuration: {0}")]
    Config(String),
}

impl SombraError {
    /// Returns the constraint failure carried by this error, if any.
    pub fn constraint_failure(&self) -> Option<&ConstraintValidationError> {
        match self {
            SombraError::ConstraintValidation(inner) => Some(inner),
            _ => None,
        }
    }

    pub(crate) fn node_not_found(node: NodeId) -> Self {
        SombraError::EntityNotFound {
            kind: EntityKind::Node,
            id: node.0,
        }
    }

    pub(crate) fn relationship_not_found(edge: EdgeId) -> Self {
        SombraError::EntityNotFound {
            kind: EntityKind::Relationship,
            id: edge.0,
        }
    }
}

/// Failures raised while enforcing a uniqueness constraint.
#[derive(thiserror::Error, Debug)]
pub enum ConstraintValidationError {
    /// Another live node already holds the value.
    #[error("node {existing} already has label {label} and property {prop} = {value}")]
    UniquenessViolation {
        /// Constrained label.
        label: LabelId,
        /// Constrained property key.
        prop: PropId,
        /// Value that collided.
        value: PropValueOwned,
        /// Node that already holds the value.
        existing: NodeId,
    },
    /// The backing index failed to build.
    #[error("index {index} is broken: {failure}")]
    IndexBroken {
        /// Index that failed.
        index: IndexDescriptor,
        /// Stored failure description.
        failure: String,
    },
    /// The backing index is still being populated; split schema and data changes
    /// into separate transactions.
    #[error("index {index} is still populating; schema and data cannot be modified in the same transaction")]
    SchemaDataConflict {
        /// Index under construction.
        index: IndexDescriptor,
    },
    /// Validation could not determine an outcome.
    #[error("unable to validate constraint on {index}: {source}")]
    UnableToValidate {
        /// Index the constraint is enforced through.
        index: IndexDescriptor,
        /// Infrastructure failure encountered on the validation path.
        #[source]
        source: ValidationFailure,
    },
}

/// Infrastructure failures folded into [`ConstraintValidationError::UnableToValidate`].
#[derive(thiserror::Error, Debug)]
pub enum ValidationFailure {
    /// The backing index disappeared between the readiness check and the lookup.
    #[error("index not found")]
    IndexNotFound,
    /// The index-entry lock could not be acquired in time.
    #[error("lock wait timed out after {waited_ms} ms")]
    LockTimeout {
        /// Milliseconds spent waiting.
        waited_ms: u64,
    },
    /// The value has no canonical key and cannot be looked up.
    #[error("value cannot be indexed: {0}")]
    Unindexable(&'static str),
    /// The statement's transaction ended before validation could read the index.
    #[error("transaction {0} is not active")]
    TransactionClosed(TxId),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SombraError>;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

impl From<u32> for LabelId {
    fn from(value: u32) -> Self {
        LabelId(value)
    }
}

impl From<LabelId> for u32 {
    fn from(value: LabelId) -> Self {
        value.0
    }
}

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        TypeId(value)
    }
}

impl From<TypeId> for u32 {
    fn from(value: TypeId) -> Self {
        value.0
    }
}

impl From<u32> for PropId {
    fn from(value: u32) -> Self {
        PropId(value)
    }
}

impl From<PropId> for u32 {
    fn from(value: PropId) -> Self {
        value.0
    }
}
