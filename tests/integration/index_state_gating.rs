#![allow(missing_docs)]

use std::sync::Arc;

use sombra_kernel::kernel::{EntityWrite, SchemaRead};
use sombra_kernel::storage::index::{IndexDescriptor, IndexState};
use sombra_kernel::storage::{CounterMetrics, Graph, KernelOptions, PropEntry};
use sombra_kernel::types::{ConstraintValidationError, LabelId, NodeId, PropId, Result};

const PERSON: LabelId = LabelId(1);
const EMAIL: PropId = PropId(1);

fn node_with_email(graph: &Graph, email: &str) -> Result<NodeId> {
    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    graph.node_set_property(&stmt, node, PropEntry::new(EMAIL, email))?;
    tx.commit()?;
    Ok(node)
}

fn commit_constraint(graph: &Graph) -> Result<IndexDescriptor> {
    let tx = graph.begin();
    let constraint = graph.create_uniqueness_constraint(&tx.statement(), PERSON, EMAIL)?;
    tx.commit()?;
    Ok(constraint.index())
}

#[test]
fn constraint_created_in_same_transaction_blocks_writes() -> Result<()> {
    let graph = Graph::new(KernelOptions::default());
    let writer = graph.enforcing_writer();
    let tx = graph.begin();
    let stmt = tx.statement();
    let constraint = graph.create_uniqueness_constraint(&stmt, PERSON, EMAIL)?;
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;

    let err = writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    match err.constraint_failure() {
        Some(ConstraintValidationError::SchemaDataConflict { index }) => {
            assert_eq!(*index, constraint.index());
        }
        other => panic!("expected schema/data conflict, got {other:?}"),
    }
    Ok(())
}

#[test]
fn adding_label_while_index_populates_is_rejected() -> Result<()> {
    let graph = Graph::new(KernelOptions::default());
    let writer = graph.enforcing_writer();
    let d = node_with_email(&graph, "d@x.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    graph.create_uniqueness_constraint(&stmt, PERSON, EMAIL)?;
    let err = writer.node_add_label(&stmt, d, PERSON).unwrap_err();
    assert!(matches!(
        err.constraint_failure(),
        Some(ConstraintValidationError::SchemaDataConflict { .. })
    ));
    Ok(())
}

#[test]
fn deferred_population_rejects_until_online() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let graph = Graph::new(
        KernelOptions::new()
            .defer_population(true)
            .metrics(metrics.clone()),
    );
    let writer = graph.enforcing_writer();
    let index = commit_constraint(&graph)?;

    let tx = graph.begin();
    let stmt = tx.statement();
    assert_eq!(graph.index_state(&stmt, &index)?, IndexState::Populating);
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;
    let err = writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    assert!(matches!(
        err.constraint_failure(),
        Some(ConstraintValidationError::SchemaDataConflict { .. })
    ));
    assert_eq!(CounterMetrics::load(&metrics.rejected_populating), 1);

    assert_eq!(graph.populate_index(index)?, IndexState::Online);
    writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;
    tx.commit()?;
    assert_eq!(CounterMetrics::load(&metrics.validations_passed), 1);
    Ok(())
}

#[test]
fn failed_index_reports_its_failure() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let graph = Graph::new(KernelOptions::new().metrics(metrics.clone()));
    let writer = graph.enforcing_writer();
    let index = commit_constraint(&graph)?;
    graph.mark_index_failed(index, "disk full during build")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;
    let err = writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    match err.constraint_failure() {
        Some(ConstraintValidationError::IndexBroken {
            index: broken,
            failure,
        }) => {
            assert_eq!(*broken, index);
            assert_eq!(failure, "disk full during build");
        }
        other => panic!("expected broken index, got {other:?}"),
    }
    assert_eq!(CounterMetrics::load(&metrics.rejected_failed), 1);
    assert_eq!(CounterMetrics::load(&metrics.locks_acquired), 0);
    Ok(())
}

#[test]
fn constraint_over_duplicate_data_is_broken() -> Result<()> {
    let graph = Graph::new(KernelOptions::default());
    let writer = graph.enforcing_writer();
    for _ in 0..2 {
        let tx = graph.begin();
        let stmt = tx.statement();
        let node = graph.create_node(&stmt)?;
        writer.node_add_label(&stmt, node, PERSON)?;
        writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, "dup@x.com"))?;
        tx.commit()?;
    }
    let index = commit_constraint(&graph)?;

    let tx = graph.begin();
    let stmt = tx.statement();
    assert_eq!(graph.index_state(&stmt, &index)?, IndexState::Failed);
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;
    let err = writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "other@x.com"))
        .unwrap_err();
    assert!(matches!(
        err.constraint_failure(),
        Some(ConstraintValidationError::IndexBroken { failure, .. }) if failure.contains("dup@x.com")
    ));
    Ok(())
}

#[test]
fn online_index_with_free_value_accepts_write() -> Result<()> {
    let graph = Graph::new(KernelOptions::default());
    let writer = graph.enforcing_writer();
    let index = commit_constraint(&graph)?;

    let tx = graph.begin();
    let stmt = tx.statement();
    assert_eq!(graph.index_state(&stmt, &index)?, IndexState::Online);
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;
    writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;
    tx.commit()?;
    Ok(())
}

#[test]
fn dropped_constraint_is_no_longer_enforced() -> Result<()> {
    let graph = Graph::new(KernelOptions::default());
    let writer = graph.enforcing_writer();
    commit_constraint(&graph)?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let constraints = graph.constraints_for_label(&stmt, PERSON)?;
    assert_eq!(constraints.len(), 1);
    graph.drop_uniqueness_constraint(&stmt, constraints[0])?;
    tx.commit()?;

    for _ in 0..2 {
        let tx = graph.begin();
        let stmt = tx.statement();
        let node = graph.create_node(&stmt)?;
        writer.node_add_label(&stmt, node, PERSON)?;
        writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;
        tx.commit()?;
    }
    Ok(())
}
