use super::{Committed, Graph, NodeRecord, TxState};
use crate::kernel::{EntityRead, SchemaRead, Statement};
use crate::storage::index::{
    visible_indexes, IndexDescriptor, IndexKind, IndexState, UniquenessConstraint, ValueKey,
    VisibleIndex,
};
use crate::storage::{EdgeData, NodeData, PropEntry, PropValueOwned, Property};
use crate::types::{EdgeId, LabelId, NodeId, PropId, Result, SombraError};

impl Graph {
    fn visible_schema(&self, stmt: &Statement<'_>) -> Result<Vec<VisibleIndex>> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut visible: Vec<_> = visible_indexes(&committed.schema, &state.schema).collect();
            visible.sort_by_key(|index| index.desc);
            Ok(visible)
        })
    }

    fn visible_index(&self, stmt: &Statement<'_>, desc: &IndexDescriptor) -> Result<VisibleIndex> {
        self.visible_schema(stmt)?
            .into_iter()
            .find(|index| index.desc == *desc)
            .ok_or(SombraError::IndexNotFound(*desc))
    }

    fn descriptors(
        &self,
        stmt: &Statement<'_>,
        kind: IndexKind,
        label: Option<LabelId>,
    ) -> Result<Vec<IndexDescriptor>> {
        Ok(self
            .visible_schema(stmt)?
            .into_iter()
            .filter(|index| index.kind == kind)
            .filter(|index| label.map_or(true, |label| index.desc.label == label))
            .map(|index| index.desc)
            .collect())
    }

    /// Snapshot of a node's labels and properties as seen by `stmt`.
    pub fn node(&self, stmt: &Statement<'_>, node: NodeId) -> Result<NodeData> {
        self.with_tx(stmt.tx(), |state, committed| {
            let record = state
                .node_view(committed, node)
                .ok_or_else(|| SombraError::node_not_found(node))?;
            Ok(NodeData {
                labels: record.labels.into_iter().collect(),
                props: record.props.into_iter().collect(),
            })
        })
    }

    /// Snapshot of a relationship as seen by `stmt`.
    pub fn relationship(&self, stmt: &Statement<'_>, edge: EdgeId) -> Result<EdgeData> {
        self.with_tx(stmt.tx(), |state, committed| {
            let record = state
                .edge_view(committed, edge)
                .ok_or_else(|| SombraError::relationship_not_found(edge))?;
            Ok(EdgeData {
                src: record.src,
                dst: record.dst,
                ty: record.ty,
                props: record.props.into_iter().collect(),
            })
        })
    }
}

/// Nodes visible to the transaction that carry `label` and satisfy `keep`.
fn scan_label(
    state: &TxState,
    committed: &Committed,
    label: LabelId,
    mut keep: impl FnMut(&NodeRecord) -> bool,
) -> Vec<NodeId> {
    let mut found: Vec<NodeId> = committed
        .nodes
        .iter()
        .filter(|&(id, record)| {
            !state.nodes.contains_key(id) && record.labels.contains(&label) && keep(record)
        })
        .map(|(id, _)| *id)
        .collect();
    for id in state.nodes.keys() {
        if let Some(record) = state.node_view(committed, *id) {
            if record.labels.contains(&label) && keep(&record) {
                found.push(*id);
            }
        }
    }
    found.sort_unstable();
    found
}

impl SchemaRead for Graph {
    fn constraints_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        Ok(self
            .visible_schema(stmt)?
            .iter()
            .filter(|index| index.desc.label == label)
            .filter_map(VisibleIndex::constraint)
            .collect())
    }

    fn constraints_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>> {
        let desc = IndexDescriptor::new(label, prop);
        Ok(self
            .visible_schema(stmt)?
            .iter()
            .filter(|index| index.desc == desc)
            .filter_map(VisibleIndex::constraint)
            .collect())
    }

    fn constraints_all(&self, stmt: &Statement<'_>) -> Result<Vec<UniquenessConstraint>> {
        Ok(self
            .visible_schema(stmt)?
            .iter()
            .filter_map(VisibleIndex::constraint)
            .collect())
    }

    fn index_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Option<IndexDescriptor>> {
        let desc = IndexDescriptor::new(label, prop);
        Ok(self
            .descriptors(stmt, IndexKind::General, Some(label))?
            .into_iter()
            .find(|found| *found == desc))
    }

    fn indexes_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        self.descriptors(stmt, IndexKind::General, Some(label))
    }

    fn indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>> {
        self.descriptors(stmt, IndexKind::General, None)
    }

    fn unique_indexes_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        self.descriptors(stmt, IndexKind::Unique, Some(label))
    }

    fn unique_indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>> {
        self.descriptors(stmt, IndexKind::Unique, None)
    }

    fn index_state(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<IndexState> {
        Ok(self.visible_index(stmt, index)?.state)
    }

    fn index_failure(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<String> {
        Ok(self
            .visible_index(stmt, index)?
            .failure
            .unwrap_or_default())
    }
}

impl EntityRead for Graph {
    fn nodes_for_label(&self, stmt: &Statement<'_>, label: LabelId) -> Result<Vec<NodeId>> {
        self.with_tx(stmt.tx(), |state, committed| {
            Ok(scan_label(state, committed, label, |_| true))
        })
    }

    fn nodes_from_index_lookup(
        &self,
        stmt: &Statement<'_>,
        index: &IndexDescriptor,
        value: &PropValueOwned,
    ) -> Result<Vec<NodeId>> {
        let key = ValueKey::encode(value)?;
        self.with_tx(stmt.tx(), |state, committed| {
            if state.schema.created_kind(index).is_some() {
                return Ok(scan_label(state, committed, index.label, |record| {
                    record.key_of(index.prop).as_ref() == Some(&key)
                }));
            }
            if state.schema.is_dropped(index) {
                return Err(SombraError::IndexNotFound(*index));
            }
            let postings = committed
                .schema
                .get(index)
                .ok_or(SombraError::IndexNotFound(*index))?;
            let mut found: Vec<NodeId> = postings
                .lookup(&key)
                .filter(|id| !state.nodes.contains_key(id))
                .collect();
            for id in state.nodes.keys() {
                let Some(record) = state.node_view(committed, *id) else {
                    continue;
                };
                if record.labels.contains(&index.label)
                    && record.key_of(index.prop).as_ref() == Some(&key)
                {
                    found.push(*id);
                }
            }
            found.sort_unstable();
            Ok(found)
        })
    }

    fn node_has_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId) -> Result<bool> {
        self.with_tx(stmt.tx(), |state, committed| {
            state
                .node_view(committed, node)
                .map(|record| record.labels.contains(&label))
                .ok_or_else(|| SombraError::node_not_found(node))
        })
    }

    fn node_get_labels(&self, stmt: &Statement<'_>, node: NodeId) -> Result<Vec<LabelId>> {
        self.with_tx(stmt.tx(), |state, committed| {
            state
                .node_view(committed, node)
                .map(|record| record.labels.into_iter().collect())
                .ok_or_else(|| SombraError::node_not_found(node))
        })
    }

    fn node_get_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut record = state
                .node_view(committed, node)
                .ok_or_else(|| SombraError::node_not_found(node))?;
            Ok(Property::from_option(prop, record.props.remove(&prop)))
        })
    }

    fn node_get_all_properties(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
    ) -> Result<Vec<PropEntry>> {
        self.with_tx(stmt.tx(), |state, committed| {
            let record = state
                .node_view(committed, node)
                .ok_or_else(|| SombraError::node_not_found(node))?;
            Ok(record
                .props
                .into_iter()
                .map(|(prop, value)| PropEntry { prop, value })
                .collect())
        })
    }

    fn relationship_get_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        prop: PropId,
    ) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut record = state
                .edge_view(committed, edge)
                .ok_or_else(|| SombraError::relationship_not_found(edge))?;
            Ok(Property::from_option(prop, record.props.remove(&prop)))
        })
    }

    fn relationship_get_all_properties(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
    ) -> Result<Vec<PropEntry>> {
        self.with_tx(stmt.tx(), |state, committed| {
            let record = state
                .edge_view(committed, edge)
                .ok_or_else(|| SombraError::relationship_not_found(edge))?;
            Ok(record
                .props
                .into_iter()
                .map(|(prop, value)| PropEntry { prop, value })
                .collect())
        })
    }

    fn graph_get_property(&self, stmt: &Statement<'_>, prop: PropId) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            Ok(Property::from_option(prop, state.graph_property(committed, prop)))
        })
    }

    fn graph_get_all_properties(&self, stmt: &Statement<'_>) -> Result<Vec<PropEntry>> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut props = committed.graph_props.clone();
            super::apply_props(&state.graph_props, &mut props);
            Ok(props
                .into_iter()
                .map(|(prop, value)| PropEntry { prop, value })
                .collect())
        })
    }
}
