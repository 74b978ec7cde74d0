use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::types::NodeId;

use super::key::ValueKey;
use super::types::{IndexDescriptor, IndexState, UniquenessConstraint};

/// Role of a property index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexKind {
    /// Backs a uniqueness constraint.
    Unique,
    /// Plain lookup index with no uniqueness guarantee.
    General,
}

/// Committed property index: lifecycle state plus value postings.
#[derive(Debug)]
pub struct PropertyIndex {
    kind: IndexKind,
    state: IndexState,
    failure: Option<String>,
    entries: FxHashMap<ValueKey, BTreeSet<NodeId>>,
}

impl PropertyIndex {
    pub(crate) fn populating(kind: IndexKind) -> Self {
        Self {
            kind,
            state: IndexState::Populating,
            failure: None,
            entries: FxHashMap::default(),
        }
    }

    /// Role of this index.
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Stored failure description; only present once the index is `Failed`.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Nodes posted under `key`.
    pub fn lookup(&self, key: &ValueKey) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.get(key).into_iter().flatten().copied()
    }

    pub(crate) fn insert(&mut self, key: ValueKey, node: NodeId) {
        self.entries.entry(key).or_default().insert(node);
    }

    pub(crate) fn remove(&mut self, key: &ValueKey, node: NodeId) {
        if let Some(nodes) = self.entries.get_mut(key) {
            nodes.remove(&node);
            if nodes.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    /// Replaces all postings and moves the index online.
    pub(crate) fn finish_population(&mut self, entries: FxHashMap<ValueKey, BTreeSet<NodeId>>) {
        self.entries = entries;
        self.state = IndexState::Online;
        self.failure = None;
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.entries.clear();
        self.state = IndexState::Failed;
        self.failure = Some(reason);
    }
}

/// Committed schema: every property index keyed by its descriptor.
///
/// Uniqueness constraints are derived from [`IndexKind::Unique`] indexes, so a
/// constraint can never exist without its backing index.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    indexes: BTreeMap<IndexDescriptor, PropertyIndex>,
}

impl SchemaCatalog {
    /// Index registered for `desc`.
    pub fn get(&self, desc: &IndexDescriptor) -> Option<&PropertyIndex> {
        self.indexes.get(desc)
    }

    pub(crate) fn get_mut(&mut self, desc: &IndexDescriptor) -> Option<&mut PropertyIndex> {
        self.indexes.get_mut(desc)
    }

    pub(crate) fn insert(&mut self, desc: IndexDescriptor, index: PropertyIndex) {
        self.indexes.insert(desc, index);
    }

    pub(crate) fn remove(&mut self, desc: &IndexDescriptor) -> Option<PropertyIndex> {
        self.indexes.remove(desc)
    }

    /// Iterates every index with its descriptor.
    pub fn iter(&self) -> impl Iterator<Item = (&IndexDescriptor, &PropertyIndex)> {
        self.indexes.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&IndexDescriptor, &mut PropertyIndex)> {
        self.indexes.iter_mut()
    }
}

/// Uncommitted schema changes of one transaction.
#[derive(Debug, Default)]
pub struct SchemaOverlay {
    created: BTreeMap<IndexDescriptor, IndexKind>,
    dropped: BTreeSet<IndexDescriptor>,
}

impl SchemaOverlay {
    pub(crate) fn create(&mut self, desc: IndexDescriptor, kind: IndexKind) {
        self.dropped.remove(&desc);
        self.created.insert(desc, kind);
    }

    pub(crate) fn drop_index(&mut self, desc: IndexDescriptor, committed: bool) {
        self.created.remove(&desc);
        if committed {
            self.dropped.insert(desc);
        }
    }

    /// Indexes created by this transaction.
    pub fn created(&self) -> impl Iterator<Item = (&IndexDescriptor, &IndexKind)> {
        self.created.iter()
    }

    /// Committed indexes this transaction dropped.
    pub fn dropped(&self) -> impl Iterator<Item = &IndexDescriptor> {
        self.dropped.iter()
    }

    /// Whether the transaction created `desc`.
    pub fn created_kind(&self, desc: &IndexDescriptor) -> Option<IndexKind> {
        self.created.get(desc).copied()
    }

    /// Whether the transaction dropped the committed index `desc`.
    pub fn is_dropped(&self, desc: &IndexDescriptor) -> bool {
        self.dropped.contains(desc)
    }
}

/// Resolved schema entry as seen by one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleIndex {
    /// Index identity.
    pub desc: IndexDescriptor,
    /// Role of the index.
    pub kind: IndexKind,
    /// Lifecycle state; indexes created by the reading transaction report `Populating`.
    pub state: IndexState,
    /// Failure description for failed indexes.
    pub failure: Option<String>,
}

impl VisibleIndex {
    /// Constraint enforced through this index, if it is unique.
    pub fn constraint(&self) -> Option<UniquenessConstraint> {
        match self.kind {
            IndexKind::Unique => Some(UniquenessConstraint::new(self.desc.label, self.desc.prop)),
            IndexKind::General => None,
        }
    }
}

/// Merges committed schema with a transaction overlay (read-your-writes).
pub fn visible_indexes<'a>(
    catalog: &'a SchemaCatalog,
    overlay: &'a SchemaOverlay,
) -> impl Iterator<Item = VisibleIndex> + 'a {
    let committed = catalog
        .iter()
        .filter(|(desc, _)| !overlay.is_dropped(desc) && overlay.created_kind(desc).is_none())
        .map(|(desc, index)| VisibleIndex {
            desc: *desc,
            kind: index.kind(),
            state: index.state(),
            failure: index.failure().map(str::to_owned),
        });
    let created = overlay.created().map(|(desc, kind)| VisibleIndex {
        desc: *desc,
        kind: *kind,
        state: IndexState::Populating,
        failure: None,
    });
    committed.chain(created)
}
