use tracing::trace;

use super::{EdgeChange, EdgeRecord, Graph, NodeChange};
use crate::kernel::{EntityWrite, Statement};
use crate::storage::{PropEntry, Property};
use crate::types::{EdgeId, LabelId, NodeId, PropId, Result, SombraError, TypeId};

impl Graph {
    /// Creates a node with no labels and no properties.
    ///
    /// Labels and properties are attached afterwards through an
    /// [`EntityWrite`], so a constraint-enforcing writer sees every value that
    /// lands on a constrained label.
    pub fn create_node(&self, stmt: &Statement<'_>) -> Result<NodeId> {
        let node = self.next_node_id();
        self.with_tx(stmt.tx(), |state, _| {
            state.nodes.insert(
                node,
                NodeChange {
                    created: true,
                    ..NodeChange::default()
                },
            );
            Ok(())
        })?;
        trace!(tx = stmt.tx().0, node = node.0, "graph.node.create");
        Ok(node)
    }

    /// Creates a relationship of type `ty` from `src` to `dst`.
    pub fn create_relationship(
        &self,
        stmt: &Statement<'_>,
        src: NodeId,
        dst: NodeId,
        ty: TypeId,
    ) -> Result<EdgeId> {
        let edge = self.next_edge_id();
        self.with_tx(stmt.tx(), |state, committed| {
            for endpoint in [src, dst] {
                if !state.node_exists(committed, endpoint) {
                    return Err(SombraError::node_not_found(endpoint));
                }
            }
            state.edges.insert(
                edge,
                EdgeChange {
                    base: Some(EdgeRecord {
                        src,
                        dst,
                        ty,
                        props: Default::default(),
                    }),
                    ..EdgeChange::default()
                },
            );
            Ok(())
        })?;
        trace!(tx = stmt.tx().0, edge = edge.0, "graph.relationship.create");
        Ok(edge)
    }
}

impl EntityWrite for Graph {
    fn node_delete(&self, stmt: &Statement<'_>, node: NodeId) -> Result<()> {
        self.with_tx(stmt.tx(), |state, committed| {
            if state.has_relationships(committed, node) {
                return Err(SombraError::Invalid("node still has relationships"));
            }
            let change = state.node_change(committed, node)?;
            if change.created {
                state.nodes.remove(&node);
            } else {
                change.deleted = true;
            }
            Ok(())
        })
    }

    fn relationship_delete(&self, stmt: &Statement<'_>, edge: EdgeId) -> Result<()> {
        self.with_tx(stmt.tx(), |state, committed| {
            let change = state.edge_change(committed, edge)?;
            if change.base.is_some() {
                state.edges.remove(&edge);
            } else {
                change.deleted = true;
            }
            Ok(())
        })
    }

    fn node_add_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId) -> Result<bool> {
        self.with_tx(stmt.tx(), |state, committed| {
            let present = state
                .node_view(committed, node)
                .ok_or_else(|| SombraError::node_not_found(node))?
                .labels
                .contains(&label);
            if present {
                return Ok(false);
            }
            state.node_change(committed, node)?.labels.insert(label, true);
            Ok(true)
        })
    }

    fn node_remove_label(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        self.with_tx(stmt.tx(), |state, committed| {
            let present = state
                .node_view(committed, node)
                .ok_or_else(|| SombraError::node_not_found(node))?
                .labels
                .contains(&label);
            if !present {
                return Ok(false);
            }
            state.node_change(committed, node)?.labels.insert(label, false);
            Ok(true)
        })
    }

    fn node_set_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        entry: PropEntry,
    ) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut record = state
                .node_view(committed, node)
                .ok_or_else(|| SombraError::node_not_found(node))?;
            let previous = Property::from_option(entry.prop, record.props.remove(&entry.prop));
            state
                .node_change(committed, node)?
                .props
                .insert(entry.prop, Some(entry.value));
            Ok(previous)
        })
    }

    fn relationship_set_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        entry: PropEntry,
    ) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut record = state
                .edge_view(committed, edge)
                .ok_or_else(|| SombraError::relationship_not_found(edge))?;
            let previous = Property::from_option(entry.prop, record.props.remove(&entry.prop));
            state
                .edge_change(committed, edge)?
                .props
                .insert(entry.prop, Some(entry.value));
            Ok(previous)
        })
    }

    fn graph_set_property(&self, stmt: &Statement<'_>, entry: PropEntry) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let previous =
                Property::from_option(entry.prop, state.graph_property(committed, entry.prop));
            state.graph_props.insert(entry.prop, Some(entry.value));
            Ok(previous)
        })
    }

    fn node_remove_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut record = state
                .node_view(committed, node)
                .ok_or_else(|| SombraError::node_not_found(node))?;
            let previous = Property::from_option(prop, record.props.remove(&prop));
            if previous.is_defined() {
                state.node_change(committed, node)?.props.insert(prop, None);
            }
            Ok(previous)
        })
    }

    fn relationship_remove_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        prop: PropId,
    ) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let mut record = state
                .edge_view(committed, edge)
                .ok_or_else(|| SombraError::relationship_not_found(edge))?;
            let previous = Property::from_option(prop, record.props.remove(&prop));
            if previous.is_defined() {
                state.edge_change(committed, edge)?.props.insert(prop, None);
            }
            Ok(previous)
        })
    }

    fn graph_remove_property(&self, stmt: &Statement<'_>, prop: PropId) -> Result<Property> {
        self.with_tx(stmt.tx(), |state, committed| {
            let previous = Property::from_option(prop, state.graph_property(committed, prop));
            if previous.is_defined() {
                state.graph_props.insert(prop, None);
            }
            Ok(previous)
        })
    }
}
