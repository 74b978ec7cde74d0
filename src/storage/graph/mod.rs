use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::kernel::{ConstraintEnforcingWriter, Statement};
use crate::primitives::concurrency::{IndexEntryLocks, Locks};
use crate::storage::index::{SchemaCatalog, SchemaOverlay, ValueKey};
use crate::storage::{default_metrics, ConstraintMetrics, KernelOptions, PropValueOwned};
use crate::types::{EdgeId, LabelId, NodeId, PropId, Result, SombraError, TxId, TypeId};

mod commit;
mod read_ops;
mod schema_ops;
mod write_ops;

/// Committed state of one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct NodeRecord {
    labels: BTreeSet<LabelId>,
    props: BTreeMap<PropId, PropValueOwned>,
    /// Sequence number of the commit that last wrote the node.
    version: u64,
}

impl NodeRecord {
    /// Index key of the value held for `prop`; NaN values have none.
    fn key_of(&self, prop: PropId) -> Option<ValueKey> {
        self.props
            .get(&prop)
            .and_then(|value| ValueKey::encode(value).ok())
    }
}

/// Committed state of one relationship.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EdgeRecord {
    src: NodeId,
    dst: NodeId,
    ty: TypeId,
    props: BTreeMap<PropId, PropValueOwned>,
}

/// Everything visible to a transaction that has no changes of its own.
#[derive(Debug, Default)]
pub(crate) struct Committed {
    nodes: BTreeMap<NodeId, NodeRecord>,
    edges: BTreeMap<EdgeId, EdgeRecord>,
    graph_props: BTreeMap<PropId, PropValueOwned>,
    schema: SchemaCatalog,
    commit_seq: u64,
}

type PropChanges = BTreeMap<PropId, Option<PropValueOwned>>;

/// Uncommitted changes to one node, replayed onto the committed record.
///
/// `base_version` is the committed version the changes were made against; a
/// commit that finds a newer version fails with a write conflict.
#[derive(Debug, Default)]
struct NodeChange {
    created: bool,
    deleted: bool,
    base_version: u64,
    labels: BTreeMap<LabelId, bool>,
    props: PropChanges,
}

impl NodeChange {
    fn apply_to(&self, record: &mut NodeRecord) {
        for (label, present) in &self.labels {
            if *present {
                record.labels.insert(*label);
            } else {
                record.labels.remove(label);
            }
        }
        apply_props(&self.props, &mut record.props);
    }
}

/// Uncommitted changes to one relationship; `base` is set when it was created
/// by the transaction.
#[derive(Debug, Default)]
struct EdgeChange {
    base: Option<EdgeRecord>,
    deleted: bool,
    props: PropChanges,
}

fn apply_props(changes: &PropChanges, props: &mut BTreeMap<PropId, PropValueOwned>) {
    for (prop, value) in changes {
        match value {
            Some(value) => {
                props.insert(*prop, value.clone());
            }
            None => {
                props.remove(prop);
            }
        }
    }
}

/// Private workspace of one open transaction.
#[derive(Debug, Default)]
pub(crate) struct TxState {
    nodes: BTreeMap<NodeId, NodeChange>,
    edges: BTreeMap<EdgeId, EdgeChange>,
    graph_props: PropChanges,
    schema: SchemaOverlay,
}

impl TxState {
    fn node_exists(&self, committed: &Committed, node: NodeId) -> bool {
        match self.nodes.get(&node) {
            Some(change) => !change.deleted && (change.created || committed.nodes.contains_key(&node)),
            None => committed.nodes.contains_key(&node),
        }
    }

    fn node_view(&self, committed: &Committed, node: NodeId) -> Option<NodeRecord> {
        match self.nodes.get(&node) {
            Some(change) if change.deleted => None,
            Some(change) => {
                let mut record = if change.created {
                    NodeRecord::default()
                } else {
                    committed.nodes.get(&node)?.clone()
                };
                change.apply_to(&mut record);
                Some(record)
            }
            None => committed.nodes.get(&node).cloned(),
        }
    }

    fn node_change(&mut self, committed: &Committed, node: NodeId) -> Result<&mut NodeChange> {
        if !self.node_exists(committed, node) {
            return Err(SombraError::node_not_found(node));
        }
        Ok(self.nodes.entry(node).or_insert_with(|| NodeChange {
            base_version: committed.nodes.get(&node).map_or(0, |record| record.version),
            ..NodeChange::default()
        }))
    }

    fn edge_view(&self, committed: &Committed, edge: EdgeId) -> Option<EdgeRecord> {
        match self.edges.get(&edge) {
            Some(change) if change.deleted => None,
            Some(change) => {
                let mut record = match &change.base {
                    Some(base) => base.clone(),
                    None => committed.edges.get(&edge)?.clone(),
                };
                apply_props(&change.props, &mut record.props);
                Some(record)
            }
            None => committed.edges.get(&edge).cloned(),
        }
    }

    fn edge_change(&mut self, committed: &Committed, edge: EdgeId) -> Result<&mut EdgeChange> {
        if self.edge_view(committed, edge).is_none() {
            return Err(SombraError::relationship_not_found(edge));
        }
        Ok(self.edges.entry(edge).or_default())
    }

    /// Whether a live relationship starts or ends at `node`.
    fn has_relationships(&self, committed: &Committed, node: NodeId) -> bool {
        let touches = |record: &EdgeRecord| record.src == node || record.dst == node;
        let committed_live = committed.edges.iter().any(|(id, record)| {
            touches(record) && !self.edges.get(id).is_some_and(|change| change.deleted)
        });
        committed_live
            || self.edges.values().any(|change| {
                !change.deleted && change.base.as_ref().is_some_and(touches)
            })
    }

    fn graph_property(&self, committed: &Committed, prop: PropId) -> Option<PropValueOwned> {
        match self.graph_props.get(&prop) {
            Some(value) => value.clone(),
            None => committed.graph_props.get(&prop).cloned(),
        }
    }
}

pub(crate) struct GraphInner {
    committed: RwLock<Committed>,
    txs: Mutex<FxHashMap<TxId, Arc<Mutex<TxState>>>>,
    locks: Arc<dyn Locks>,
    next_tx: AtomicU64,
    next_node: AtomicU64,
    next_edge: AtomicU64,
    defer_population: bool,
    metrics: Arc<dyn ConstraintMetrics>,
}

/// In-memory transactional graph store.
///
/// `Graph` implements [`crate::kernel::SchemaRead`], [`crate::kernel::EntityRead`]
/// and [`crate::kernel::EntityWrite`]. Each transaction buffers its changes in a
/// private overlay; reads see committed data plus the reader's own changes.
/// Commit publishes the overlay under the store's write lock and only then
/// releases the transaction's index-entry locks. Nothing is persisted.
///
/// Handles are cheap to clone and share the same underlying state.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl Graph {
    /// Creates an empty graph with its own index-entry lock manager.
    pub fn new(opts: KernelOptions) -> Self {
        let locks = Arc::new(IndexEntryLocks::with_timeout(opts.lock_wait_timeout));
        Self::with_locks(opts, locks)
    }

    /// Creates an empty graph that acquires index-entry locks through `locks`.
    pub fn with_locks(opts: KernelOptions, locks: Arc<dyn Locks>) -> Self {
        let metrics = opts.metrics.unwrap_or_else(default_metrics);
        Self {
            inner: Arc::new(GraphInner {
                committed: RwLock::new(Committed::default()),
                txs: Mutex::new(FxHashMap::default()),
                locks,
                next_tx: AtomicU64::new(1),
                next_node: AtomicU64::new(1),
                next_edge: AtomicU64::new(1),
                defer_population: opts.defer_population,
                metrics,
            }),
        }
    }

    /// Opens a new transaction.
    pub fn begin(&self) -> Transaction {
        let id = TxId(self.inner.next_tx.fetch_add(1, Ordering::SeqCst));
        self.inner
            .txs
            .lock()
            .insert(id, Arc::new(Mutex::new(TxState::default())));
        debug!(tx = id.0, "graph.begin");
        Transaction {
            id,
            graph: self.clone(),
            active: true,
        }
    }

    /// Number of transactions that have neither committed nor rolled back.
    pub fn active_transactions(&self) -> usize {
        self.inner.txs.lock().len()
    }

    /// Builds a constraint-enforcing writer over this graph, reporting to the
    /// metrics sink the graph was opened with.
    pub fn enforcing_writer(&self) -> ConstraintEnforcingWriter<Graph, Graph, Graph> {
        ConstraintEnforcingWriter::with_metrics(
            self.clone(),
            self.clone(),
            self.clone(),
            Arc::clone(&self.inner.metrics),
        )
    }

    fn tx_handle(&self, tx: TxId) -> Result<Arc<Mutex<TxState>>> {
        self.inner
            .txs
            .lock()
            .get(&tx)
            .cloned()
            .ok_or(SombraError::TransactionClosed(tx))
    }

    /// Runs `f` against the transaction's overlay and the committed state.
    ///
    /// The overlay lock is always taken before the committed-state lock.
    fn with_tx<T>(
        &self,
        tx: TxId,
        f: impl FnOnce(&mut TxState, &Committed) -> Result<T>,
    ) -> Result<T> {
        let handle = self.tx_handle(tx)?;
        let mut state = handle.lock();
        let committed = self.inner.committed.read();
        f(&mut state, &committed)
    }

    fn next_node_id(&self) -> NodeId {
        NodeId(self.inner.next_node.fetch_add(1, Ordering::SeqCst))
    }

    fn next_edge_id(&self) -> EdgeId {
        EdgeId(self.inner.next_edge.fetch_add(1, Ordering::SeqCst))
    }
}

/// Handle to an open transaction on a [`Graph`].
///
/// Dropping the handle without committing rolls the transaction back.
pub struct Transaction {
    id: TxId,
    graph: Graph,
    active: bool,
}

impl Transaction {
    /// Transaction identifier.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Statement context for kernel calls made in this transaction.
    pub fn statement(&self) -> Statement<'_> {
        Statement::new(self.id, self.graph.inner.locks.as_ref())
    }

    /// Publishes the transaction's changes and releases its locks.
    ///
    /// If a node or relationship the transaction changed was deleted by a
    /// transaction that committed first, nothing is published and the error is
    /// returned. Locks are released either way.
    pub fn commit(mut self) -> Result<()> {
        self.active = false;
        self.graph.commit_tx(self.id)
    }

    /// Discards the transaction's changes and releases its locks.
    pub fn rollback(mut self) {
        self.active = false;
        self.graph.rollback_tx(self.id);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.active {
            self.graph.rollback_tx(self.id);
        }
    }
}
