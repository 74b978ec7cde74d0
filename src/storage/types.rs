use std::fmt;

use crate::types::{LabelId, NodeId, PropId, TypeId};

/// Homogeneous array of scalar property values.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayValue {
    /// Array of booleans.
    Bool(Vec<bool>),
    /// Array of 64-bit signed integers.
    Int(Vec<i64>),
    /// Array of 64-bit floating point numbers.
    Float(Vec<f64>),
    /// Array of strings.
    Str(Vec<String>),
}

impl ArrayValue {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Bool(v) => v.len(),
            ArrayValue::Int(v) => v.len(),
            ArrayValue::Float(v) => v.len(),
            ArrayValue::Str(v) => v.len(),
        }
    }

    /// Returns `true` when the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Property value with owned data.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValueOwned {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    Str(String),
    /// Homogeneous array of scalars.
    Array(ArrayValue),
}

impl fmt::Display for PropValueOwned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValueOwned::Bool(v) => write!(f, "{v}"),
            PropValueOwned::Int(v) => write!(f, "{v}"),
            PropValueOwned::Float(v) => write!(f, "{v}"),
            PropValueOwned::Str(v) => write!(f, "{v:?}"),
            PropValueOwned::Array(ArrayValue::Bool(v)) => write!(f, "{v:?}"),
            PropValueOwned::Array(ArrayValue::Int(v)) => write!(f, "{v:?}"),
            PropValueOwned::Array(ArrayValue::Float(v)) => write!(f, "{v:?}"),
            PropValueOwned::Array(ArrayValue::Str(v)) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for PropValueOwned {
    fn from(value: bool) -> Self {
        PropValueOwned::Bool(value)
    }
}

impl From<i64> for PropValueOwned {
    fn from(value: i64) -> Self {
        PropValueOwned::Int(value)
    }
}

impl From<f64> for PropValueOwned {
    fn from(value: f64) -> Self {
        PropValueOwned::Float(value)
    }
}

impl From<&str> for PropValueOwned {
    fn from(value: &str) -> Self {
        PropValueOwned::Str(value.to_owned())
    }
}

impl From<String> for PropValueOwned {
    fn from(value: String) -> Self {
        PropValueOwned::Str(value)
    }
}

impl From<ArrayValue> for PropValueOwned {
    fn from(value: ArrayValue) -> Self {
        PropValueOwned::Array(value)
    }
}

/// Property entry associating a property ID with a value.
#[derive(Clone, Debug, PartialEq)]
pub struct PropEntry {
    /// The property identifier.
    pub prop: PropId,
    /// The property value.
    pub value: PropValueOwned,
}

impl PropEntry {
    /// Creates a new property entry.
    pub fn new(prop: PropId, value: impl Into<PropValueOwned>) -> Self {
        Self {
            prop,
            value: value.into(),
        }
    }
}

/// Result of reading one property key from an entity.
///
/// Absence is its own state: an entity either carries a value for the key or it
/// does not, and "does not" never collapses into an empty or zero value.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    /// The entity carries a value for the key.
    Defined(PropEntry),
    /// The entity has no value for the key.
    Undefined {
        /// Key that was read.
        prop: PropId,
    },
}

impl Property {
    /// Builds a defined property.
    pub fn defined(prop: PropId, value: impl Into<PropValueOwned>) -> Self {
        Property::Defined(PropEntry::new(prop, value))
    }

    /// Builds an undefined property for `prop`.
    pub fn undefined(prop: PropId) -> Self {
        Property::Undefined { prop }
    }

    /// Wraps an optional value read from storage.
    pub fn from_option(prop: PropId, value: Option<PropValueOwned>) -> Self {
        match value {
            Some(value) => Property::Defined(PropEntry { prop, value }),
            None => Property::Undefined { prop },
        }
    }

    /// Property key this result refers to.
    pub fn prop(&self) -> PropId {
        match self {
            Property::Defined(entry) => entry.prop,
            Property::Undefined { prop } => *prop,
        }
    }

    /// Whether the entity carried a value.
    pub fn is_defined(&self) -> bool {
        matches!(self, Property::Defined(_))
    }

    /// Borrowed value, if defined.
    pub fn value(&self) -> Option<&PropValueOwned> {
        match self {
            Property::Defined(entry) => Some(&entry.value),
            Property::Undefined { .. } => None,
        }
    }

    /// Consumes the result, yielding the entry if defined.
    pub fn into_entry(self) -> Option<PropEntry> {
        match self {
            Property::Defined(entry) => Some(entry),
            Property::Undefined { .. } => None,
        }
    }
}

/// Complete node data with owned values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeData {
    /// Node labels, sorted and deduplicated.
    pub labels: Vec<LabelId>,
    /// Node properties as (property ID, value) pairs, sorted by key.
    pub props: Vec<(PropId, PropValueOwned)>,
}

/// Complete relationship data with owned values.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeData {
    /// Source node ID.
    pub src: NodeId,
    /// Destination node ID.
    pub dst: NodeId,
    /// Relationship type ID.
    pub ty: TypeId,
    /// Relationship properties as (property ID, value) pairs, sorted by key.
    pub props: Vec<(PropId, PropValueOwned)>,
}
