use std::sync::Arc;

use crate::storage::index::{IndexDescriptor, IndexState, UniquenessConstraint};
use crate::storage::{PropEntry, PropValueOwned, Property};
use crate::types::{EdgeId, LabelId, NodeId, PropId, Result};

use super::Statement;

/// Read access to the schema as seen by one transaction.
///
/// Implementations return the transaction's own uncommitted schema changes
/// where present and the latest committed schema otherwise. A uniqueness
/// constraint is always backed by exactly one index with the same descriptor.
pub trait SchemaRead: Send + Sync {
    /// Uniqueness constraints declared on `label`.
    fn constraints_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>>;

    /// Uniqueness constraints declared on `(label, prop)`; at most one.
    fn constraints_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>>;

    /// Every uniqueness constraint.
    fn constraints_all(&self, stmt: &Statement<'_>) -> Result<Vec<UniquenessConstraint>>;

    /// Non-unique index over `(label, prop)`, if any.
    fn index_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Option<IndexDescriptor>>;

    /// Non-unique indexes over `label`.
    fn indexes_for_label(&self, stmt: &Statement<'_>, label: LabelId)
        -> Result<Vec<IndexDescriptor>>;

    /// Every non-unique index.
    fn indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>>;

    /// Constraint-backing indexes over `label`.
    fn unique_indexes_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>>;

    /// Every constraint-backing index.
    fn unique_indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>>;

    /// Lifecycle state of `index`.
    ///
    /// Fails with [`crate::types::SombraError::IndexNotFound`] when no index is
    /// registered for the descriptor.
    fn index_state(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<IndexState>;

    /// Stored failure description of a `Failed` index.
    fn index_failure(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<String>;
}

/// Read access to entities, scoped to one transaction.
///
/// Reads observe committed data plus the transaction's own uncommitted writes.
pub trait EntityRead: Send + Sync {
    /// Nodes carrying `label`, in id order.
    fn nodes_for_label(&self, stmt: &Statement<'_>, label: LabelId) -> Result<Vec<NodeId>>;

    /// Nodes whose value under `index` equals `value`.
    fn nodes_from_index_lookup(
        &self,
        stmt: &Statement<'_>,
        index: &IndexDescriptor,
        value: &PropValueOwned,
    ) -> Result<Vec<NodeId>>;

    /// Whether `node` carries `label`.
    fn node_has_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId) -> Result<bool>;

    /// Labels of `node`, sorted.
    fn node_get_labels(&self, stmt: &Statement<'_>, node: NodeId) -> Result<Vec<LabelId>>;

    /// Value of `prop` on `node`; [`Property::Undefined`] when absent.
    fn node_get_property(&self, stmt: &Statement<'_>, node: NodeId, prop: PropId)
        -> Result<Property>;

    /// All properties of `node`, sorted by key.
    fn node_get_all_properties(&self, stmt: &Statement<'_>, node: NodeId)
        -> Result<Vec<PropEntry>>;

    /// Value of `prop` on `edge`.
    fn relationship_get_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        prop: PropId,
    ) -> Result<Property>;

    /// All properties of `edge`, sorted by key.
    fn relationship_get_all_properties(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
    ) -> Result<Vec<PropEntry>>;

    /// Value of `prop` on the graph entity.
    fn graph_get_property(&self, stmt: &Statement<'_>, prop: PropId) -> Result<Property>;

    /// All properties of the graph entity, sorted by key.
    fn graph_get_all_properties(&self, stmt: &Statement<'_>) -> Result<Vec<PropEntry>>;
}

/// Raw entity mutations with no constraint awareness.
///
/// Every operation fails with [`crate::types::SombraError::EntityNotFound`] when
/// the target entity does not exist in the transaction's view.
pub trait EntityWrite: Send + Sync {
    /// Deletes `node`.
    fn node_delete(&self, stmt: &Statement<'_>, node: NodeId) -> Result<()>;

    /// Deletes `edge`.
    fn relationship_delete(&self, stmt: &Statement<'_>, edge: EdgeId) -> Result<()>;

    /// Adds `label` to `node`; returns `false` when it was already present.
    fn node_add_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId) -> Result<bool>;

    /// Removes `label` from `node`; returns `false` when it was absent.
    fn node_remove_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId)
        -> Result<bool>;

    /// Sets a property on `node`, returning the previous value.
    fn node_set_property(&self, stmt: &Statement<'_>, node: NodeId, entry: PropEntry)
        -> Result<Property>;

    /// Sets a property on `edge`, returning the previous value.
    fn relationship_set_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        entry: PropEntry,
    ) -> Result<Property>;

    /// Sets a property on the graph entity, returning the previous value.
    fn graph_set_property(&self, stmt: &Statement<'_>, entry: PropEntry) -> Result<Property>;

    /// Removes `prop` from `node`, returning the previous value.
    fn node_remove_property(&self, stmt: &Statement<'_>, node: NodeId, prop: PropId)
        -> Result<Property>;

    /// Removes `prop` from `edge`, returning the previous value.
    fn relationship_remove_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        prop: PropId,
    ) -> Result<Property>;

    /// Removes `prop` from the graph entity, returning the previous value.
    fn graph_remove_property(&self, stmt: &Statement<'_>, prop: PropId) -> Result<Property>;
}

impl<T: SchemaRead + ?Sized> SchemaRead for Arc<T> {
    fn constraints_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        (**self).constraints_for_label(stmt, label)
    }

    fn constraints_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>> {
        (**self).constraints_for_label_and_prop(stmt, label, prop)
    }

    fn constraints_all(&self, stmt: &Statement<'_>) -> Result<Vec<UniquenessConstraint>> {
        (**self).constraints_all(stmt)
    }

    fn index_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Option<IndexDescriptor>> {
        (**self).index_for_label_and_prop(stmt, label, prop)
    }

    fn indexes_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        (**self).indexes_for_label(stmt, label)
    }

    fn indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>> {
        (**self).indexes_all(stmt)
    }

    fn unique_indexes_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        (**self).unique_indexes_for_label(stmt, label)
    }

    fn unique_indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>> {
        (**self).unique_indexes_all(stmt)
    }

    fn index_state(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<IndexState> {
        (**self).index_state(stmt, index)
    }

    fn index_failure(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<String> {
        (**self).index_failure(stmt, index)
    }
}

impl<T: EntityRead + ?Sized> EntityRead for Arc<T> {
    fn nodes_for_label(&self, stmt: &Statement<'_>, label: LabelId) -> Result<Vec<NodeId>> {
        (**self).nodes_for_label(stmt, label)
    }

    fn nodes_from_index_lookup(
        &self,
        stmt: &Statement<'_>,
        index: &IndexDescriptor,
        value: &PropValueOwned,
    ) -> Result<Vec<NodeId>> {
        (**self).nodes_from_index_lookup(stmt, index, value)
    }

    fn node_has_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId) -> Result<bool> {
        (**self).node_has_label(stmt, node, label)
    }

    fn node_get_labels(&self, stmt: &Statement<'_>, node: NodeId) -> Result<Vec<LabelId>> {
        (**self).node_get_labels(stmt, node)
    }

    fn node_get_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property> {
        (**self).node_get_property(stmt, node, prop)
    }

    fn node_get_all_properties(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
    ) -> Result<Vec<PropEntry>> {
        (**self).node_get_all_properties(stmt, node)
    }

    fn relationship_get_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        prop: PropId,
    ) -> Result<Property> {
        (**self).relationship_get_property(stmt, edge, prop)
    }

    fn relationship_get_all_properties(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
    ) -> Result<Vec<PropEntry>> {
        (**self).relationship_get_all_properties(stmt, edge)
    }

    fn graph_get_property(&self, stmt: &Statement<'_>, prop: PropId) -> Result<Property> {
        (**self).graph_get_property(stmt, prop)
    }

    fn graph_get_all_properties(&self, stmt: &Statement<'_>) -> Result<Vec<PropEntry>> {
        (**self).graph_get_all_properties(stmt)
    }
}

impl<T: EntityWrite + ?Sized> EntityWrite for Arc<T> {
    fn node_delete(&self, stmt: &Statement<'_>, node: NodeId) -> Result<()> {
        (**self).node_delete(stmt, node)
    }

    fn relationship_delete(&self, stmt: &Statement<'_>, edge: EdgeId) -> Result<()> {
        (**self).relationship_delete(stmt, edge)
    }

    fn node_add_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId) -> Result<bool> {
        (**self).node_add_label(stmt, node, label)
    }

    fn node_remove_label(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        (**self).node_remove_label(stmt, node, label)
    }

    fn node_set_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        entry: PropEntry,
    ) -> Result<Property> {
        (**self).node_set_property(stmt, node, entry)
    }

    fn relationship_set_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        entry: PropEntry,
    ) -> Result<Property> {
        (**self).relationship_set_property(stmt, edge, entry)
    }

    fn graph_set_property(&self, stmt: &Statement<'_>, entry: PropEntry) -> Result<Property> {
        (**self).graph_set_property(stmt, entry)
    }

    fn node_remove_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property> {
        (**self).node_remove_property(stmt, node, prop)
    }

    fn relationship_remove_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        prop: PropId,
    ) -> Result<Property> {
        (**self).relationship_remove_property(stmt, edge, prop)
    }

    fn graph_remove_property(&self, stmt: &Statement<'_>, prop: PropId) -> Result<Property> {
        (**self).graph_remove_property(stmt, prop)
    }
}
