use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use super::{Committed, Graph, NodeRecord, TxState};
use crate::storage::index::{IndexDescriptor, IndexKind, IndexState, PropertyIndex, ValueKey};
use crate::storage::PropValueOwned;
use crate::types::{ConstraintValidationError, EntityKind, NodeId, Result, SombraError, TxId};

/// Counts of what one commit published.
#[derive(Debug, Default, Clone, Copy)]
struct CommitStats {
    nodes: usize,
    edges: usize,
    indexes_created: usize,
    indexes_dropped: usize,
}

impl Graph {
    pub(crate) fn commit_tx(&self, tx: TxId) -> Result<()> {
        let handle = self
            .inner
            .txs
            .lock()
            .remove(&tx)
            .ok_or(SombraError::TransactionClosed(tx))?;
        let state = std::mem::take(&mut *handle.lock());
        let outcome = {
            let mut committed = self.inner.committed.write();
            validate(&committed, &state)
                .map(|()| apply(&mut committed, state, self.inner.defer_population))
        };
        // Writes are visible before any waiter on this transaction's locks wakes up.
        self.inner.locks.release_all(tx);
        match outcome {
            Ok(stats) => {
                debug!(
                    tx = tx.0,
                    nodes = stats.nodes,
                    edges = stats.edges,
                    indexes_created = stats.indexes_created,
                    indexes_dropped = stats.indexes_dropped,
                    "graph.commit"
                );
                Ok(())
            }
            Err(err) => {
                warn!(tx = tx.0, error = %err, "graph.commit.aborted");
                Err(err)
            }
        }
    }

    pub(crate) fn rollback_tx(&self, tx: TxId) {
        let removed = self.inner.txs.lock().remove(&tx).is_some();
        self.inner.locks.release_all(tx);
        if removed {
            debug!(tx = tx.0, "graph.rollback");
        }
    }
}

/// Rejects a commit whose changes target entities that no longer exist, nodes
/// another transaction changed since this one first touched them, or values
/// already held under an online unique index.
fn validate(committed: &Committed, state: &TxState) -> Result<()> {
    for (id, change) in &state.nodes {
        if !change.created {
            let record = committed
                .nodes
                .get(id)
                .ok_or_else(|| SombraError::node_not_found(*id))?;
            if record.version != change.base_version {
                return Err(SombraError::WriteConflict {
                    kind: EntityKind::Node,
                    id: id.0,
                });
            }
        }
        if change.deleted && has_live_relationships(committed, state, *id) {
            return Err(SombraError::Invalid("node still has relationships"));
        }
    }
    check_unique_indexes(committed, state)?;
    for (id, change) in &state.edges {
        match &change.base {
            Some(base) if !change.deleted => {
                for endpoint in [base.src, base.dst] {
                    if !survives(committed, state, endpoint) {
                        return Err(SombraError::node_not_found(endpoint));
                    }
                }
            }
            Some(_) => {}
            None => {
                if !committed.edges.contains_key(id) {
                    return Err(SombraError::relationship_not_found(*id));
                }
            }
        }
    }
    Ok(())
}

/// Re-checks every online unique index against the values this transaction
/// moves into it.
///
/// Write-time validation only sees constraints visible when the write ran; a
/// constraint committed while this transaction was open is enforced here.
fn check_unique_indexes(committed: &Committed, state: &TxState) -> Result<()> {
    for (desc, index) in committed.schema.iter() {
        if index.kind() != IndexKind::Unique
            || index.state() != IndexState::Online
            || state.schema.is_dropped(desc)
        {
            continue;
        }
        let mut claimed: FxHashMap<ValueKey, NodeId> = FxHashMap::default();
        for id in state.nodes.keys() {
            let Some(after) = state.node_view(committed, *id) else {
                continue;
            };
            if !after.labels.contains(&desc.label) {
                continue;
            }
            let Some(value) = after.props.get(&desc.prop) else {
                continue;
            };
            let Ok(key) = ValueKey::encode(value) else {
                continue;
            };
            let before = committed
                .nodes
                .get(id)
                .and_then(|record| indexed_key(record, desc));
            if before.as_ref() == Some(&key) {
                continue;
            }
            let holder = index
                .lookup(&key)
                .find(|other| {
                    other != id && still_holds(committed, state, *other, desc, &key)
                })
                .or_else(|| claimed.get(&key).copied());
            if let Some(existing) = holder {
                return Err(ConstraintValidationError::UniquenessViolation {
                    label: desc.label,
                    prop: desc.prop,
                    value: value.clone(),
                    existing,
                }
                .into());
            }
            claimed.insert(key, *id);
        }
    }
    Ok(())
}

/// Whether `node` keeps `key` under `desc` once this transaction's changes apply.
fn still_holds(
    committed: &Committed,
    state: &TxState,
    node: NodeId,
    desc: &IndexDescriptor,
    key: &ValueKey,
) -> bool {
    if !state.nodes.contains_key(&node) {
        return true;
    }
    state
        .node_view(committed, node)
        .and_then(|record| indexed_key(&record, desc))
        .as_ref()
        == Some(key)
}

fn survives(committed: &Committed, state: &TxState, node: NodeId) -> bool {
    match state.nodes.get(&node) {
        Some(change) => !change.deleted && (change.created || committed.nodes.contains_key(&node)),
        None => committed.nodes.contains_key(&node),
    }
}

/// Relationships committed by other transactions count as well as our own.
fn has_live_relationships(committed: &Committed, state: &TxState, node: NodeId) -> bool {
    committed.edges.iter().any(|(id, record)| {
        (record.src == node || record.dst == node)
            && !state.edges.get(id).is_some_and(|change| change.deleted)
    })
}

fn apply(committed: &mut Committed, state: TxState, defer_population: bool) -> CommitStats {
    let TxState {
        nodes,
        edges,
        graph_props,
        schema,
    } = state;
    committed.commit_seq += 1;
    let version = committed.commit_seq;
    let mut stats = CommitStats {
        nodes: nodes.len(),
        edges: edges.len(),
        ..CommitStats::default()
    };

    for (id, change) in nodes {
        let before = committed.nodes.get(&id).cloned();
        let after = if change.deleted {
            None
        } else {
            let mut record = before.clone().unwrap_or_default();
            change.apply_to(&mut record);
            record.version = version;
            Some(record)
        };
        update_postings(committed, id, before.as_ref(), after.as_ref());
        match after {
            Some(record) => {
                committed.nodes.insert(id, record);
            }
            None => {
                committed.nodes.remove(&id);
            }
        }
    }

    for (id, change) in edges {
        if change.deleted {
            committed.edges.remove(&id);
            continue;
        }
        let record = match change.base {
            Some(base) => committed.edges.entry(id).or_insert(base),
            None => match committed.edges.get_mut(&id) {
                Some(record) => record,
                None => continue,
            },
        };
        super::apply_props(&change.props, &mut record.props);
    }

    super::apply_props(&graph_props, &mut committed.graph_props);

    for desc in schema.dropped() {
        if committed.schema.remove(desc).is_some() {
            stats.indexes_dropped += 1;
            info!(index = %desc, "graph.index.dropped");
        }
    }
    for (desc, kind) in schema.created() {
        committed
            .schema
            .insert(*desc, PropertyIndex::populating(*kind));
        stats.indexes_created += 1;
        info!(index = %desc, kind = ?kind, "graph.index.created");
        if !defer_population {
            if let Err(err) = populate(committed, desc) {
                warn!(index = %desc, error = %err, "graph.index.population_skipped");
            }
        }
    }
    stats
}

fn indexed_key(record: &NodeRecord, desc: &IndexDescriptor) -> Option<ValueKey> {
    if !record.labels.contains(&desc.label) {
        return None;
    }
    record.key_of(desc.prop)
}

/// Moves `node` between postings of every live index whose key it changed.
fn update_postings(
    committed: &mut Committed,
    node: NodeId,
    before: Option<&NodeRecord>,
    after: Option<&NodeRecord>,
) {
    for (desc, index) in committed.schema.iter_mut() {
        if index.state() == IndexState::Failed {
            continue;
        }
        let old = before.and_then(|record| indexed_key(record, desc));
        let new = after.and_then(|record| indexed_key(record, desc));
        if old == new {
            continue;
        }
        if let Some(key) = old {
            index.remove(&key, node);
        }
        if let Some(key) = new {
            index.insert(key, node);
        }
    }
}

/// Rebuilds the postings of `desc` from committed nodes.
///
/// A unique index over data that already holds a duplicate value ends up
/// `Failed` with a description naming two of the offending nodes.
pub(super) fn populate(committed: &mut Committed, desc: &IndexDescriptor) -> Result<IndexState> {
    let Committed { nodes, schema, .. } = committed;
    let index = schema
        .get_mut(desc)
        .ok_or(SombraError::IndexNotFound(*desc))?;
    let unique = index.kind() == IndexKind::Unique;
    let mut entries: FxHashMap<ValueKey, BTreeSet<NodeId>> = FxHashMap::default();
    let mut duplicate: Option<(NodeId, NodeId, PropValueOwned)> = None;
    for (id, record) in nodes.iter() {
        if !record.labels.contains(&desc.label) {
            continue;
        }
        let Some(value) = record.props.get(&desc.prop) else {
            continue;
        };
        let Ok(key) = ValueKey::encode(value) else {
            continue;
        };
        let holders = entries.entry(key).or_default();
        if unique && duplicate.is_none() {
            if let Some(first) = holders.first() {
                duplicate = Some((*first, *id, value.clone()));
            }
        }
        holders.insert(*id);
    }
    match duplicate {
        Some((first, second, value)) => {
            let reason = format!(
                "nodes {first} and {second} both have label {} and property {} = {value}",
                desc.label, desc.prop
            );
            warn!(index = %desc, %reason, "graph.index.population_failed");
            index.fail(reason);
            Ok(IndexState::Failed)
        }
        None => {
            let values = entries.len();
            index.finish_population(entries);
            info!(index = %desc, values, "graph.index.online");
            Ok(IndexState::Online)
        }
    }
}
