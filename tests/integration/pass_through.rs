#![allow(missing_docs)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sombra_kernel::kernel::{
    ConstraintEnforcingWriter, EntityRead, EntityWrite, SchemaRead, Statement,
};
use sombra_kernel::primitives::concurrency::{IndexEntryLock, IndexEntryLocks, Locks};
use sombra_kernel::storage::index::{IndexDescriptor, IndexState, UniquenessConstraint};
use sombra_kernel::storage::{Graph, KernelOptions, PropEntry, Property};
use sombra_kernel::types::{LabelId, PropId, Result, TxId, TypeId};

const PERSON: LabelId = LabelId(1);
const EMAIL: PropId = PropId(1);
const SINCE: PropId = PropId(2);

/// Schema reader that counts every call before delegating.
struct CountingSchema {
    graph: Graph,
    calls: AtomicUsize,
}

impl CountingSchema {
    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SchemaRead for CountingSchema {
    fn constraints_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        self.tick();
        self.graph.constraints_for_label(stmt, label)
    }

    fn constraints_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>> {
        self.tick();
        self.graph.constraints_for_label_and_prop(stmt, label, prop)
    }

    fn constraints_all(&self, stmt: &Statement<'_>) -> Result<Vec<UniquenessConstraint>> {
        self.tick();
        self.graph.constraints_all(stmt)
    }

    fn index_for_label_and_prop(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<Option<IndexDescriptor>> {
        self.tick();
        self.graph.index_for_label_and_prop(stmt, label, prop)
    }

    fn indexes_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        self.tick();
        self.graph.indexes_for_label(stmt, label)
    }

    fn indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>> {
        self.tick();
        self.graph.indexes_all(stmt)
    }

    fn unique_indexes_for_label(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        self.tick();
        self.graph.unique_indexes_for_label(stmt, label)
    }

    fn unique_indexes_all(&self, stmt: &Statement<'_>) -> Result<Vec<IndexDescriptor>> {
        self.tick();
        self.graph.unique_indexes_all(stmt)
    }

    fn index_state(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<IndexState> {
        self.tick();
        self.graph.index_state(stmt, index)
    }

    fn index_failure(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<String> {
        self.tick();
        self.graph.index_failure(stmt, index)
    }
}

/// Lock manager that counts acquisitions.
#[derive(Default)]
struct CountingLocks {
    inner: IndexEntryLocks,
    acquired: AtomicUsize,
}

impl Locks for CountingLocks {
    fn acquire_index_entry_write_lock(&self, tx: TxId, lock: &IndexEntryLock) -> Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire_index_entry_write_lock(tx, lock)
    }

    fn release_all(&self, tx: TxId) {
        self.inner.release_all(tx)
    }
}

struct Fixture {
    graph: Graph,
    schema: Arc<CountingSchema>,
    locks: Arc<CountingLocks>,
    writer: ConstraintEnforcingWriter<Graph, Graph, Arc<CountingSchema>>,
}

fn fixture() -> Result<Fixture> {
    let locks = Arc::new(CountingLocks::default());
    let graph = Graph::with_locks(KernelOptions::default(), locks.clone());
    let tx = graph.begin();
    graph.create_uniqueness_constraint(&tx.statement(), PERSON, EMAIL)?;
    tx.commit()?;
    let schema = Arc::new(CountingSchema {
        graph: graph.clone(),
        calls: AtomicUsize::new(0),
    });
    let writer = ConstraintEnforcingWriter::new(graph.clone(), graph.clone(), Arc::clone(&schema));
    Ok(Fixture {
        graph,
        schema,
        locks,
        writer,
    })
}

#[test]
fn unconstrained_operations_skip_schema_and_locks() -> Result<()> {
    let Fixture {
        graph,
        schema,
        locks,
        writer,
    } = fixture()?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let a = graph.create_node(&stmt)?;
    let b = graph.create_node(&stmt)?;
    graph.node_add_label(&stmt, a, PERSON)?;
    graph.node_set_property(&stmt, a, PropEntry::new(EMAIL, "x@y.com"))?;
    let edge = graph.create_relationship(&stmt, a, b, TypeId(1))?;
    tx.commit()?;

    let tx = graph.begin();
    let stmt = tx.statement();
    assert_eq!(
        writer.relationship_set_property(&stmt, edge, PropEntry::new(SINCE, 2020i64))?,
        Property::undefined(SINCE)
    );
    assert_eq!(
        writer.relationship_remove_property(&stmt, edge, SINCE)?,
        Property::defined(SINCE, 2020i64)
    );
    writer.graph_set_property(&stmt, PropEntry::new(SINCE, "x@y.com"))?;
    writer.graph_remove_property(&stmt, SINCE)?;
    assert_eq!(
        writer.node_remove_property(&stmt, a, EMAIL)?,
        Property::defined(EMAIL, "x@y.com")
    );
    assert!(writer.node_remove_label(&stmt, a, PERSON)?);
    writer.relationship_delete(&stmt, edge)?;
    writer.node_delete(&stmt, b)?;
    tx.commit()?;

    assert_eq!(schema.calls(), 0);
    assert_eq!(locks.acquired.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn unlabelled_node_property_needs_no_schema() -> Result<()> {
    let fixture = fixture()?;
    let tx = fixture.graph.begin();
    let stmt = tx.statement();
    let node = fixture.graph.create_node(&stmt)?;
    fixture
        .writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;
    assert_eq!(fixture.schema.calls(), 0);
    assert_eq!(fixture.locks.acquired.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn labels_without_constraints_take_no_locks() -> Result<()> {
    let fixture = fixture()?;
    let tx = fixture.graph.begin();
    let stmt = tx.statement();
    let node = fixture.graph.create_node(&stmt)?;
    fixture
        .writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;
    fixture.writer.node_add_label(&stmt, node, LabelId(9))?;
    fixture
        .writer
        .node_set_property(&stmt, node, PropEntry::new(SINCE, 1i64))?;

    assert_eq!(fixture.schema.calls(), 2);
    assert_eq!(fixture.locks.acquired.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.graph.node_get_labels(&stmt, node)?, vec![LabelId(9)]);
    Ok(())
}

#[test]
fn constrained_write_locks_once_per_value() -> Result<()> {
    let fixture = fixture()?;
    let tx = fixture.graph.begin();
    let stmt = tx.statement();
    let node = fixture.graph.create_node(&stmt)?;
    fixture.writer.node_add_label(&stmt, node, PERSON)?;
    fixture
        .writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;

    assert_eq!(fixture.locks.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.locks.inner.held_by(tx.id()).len(), 1);
    tx.commit()?;
    assert_eq!(fixture.locks.inner.snapshot().held, 0);
    Ok(())
}
