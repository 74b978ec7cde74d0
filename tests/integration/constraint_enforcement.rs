#![allow(missing_docs)]

use std::sync::Arc;

use sombra_kernel::kernel::{ConstraintEnforcingWriter, EntityRead, EntityWrite};
use sombra_kernel::storage::{
    ArrayValue, CounterMetrics, Graph, KernelOptions, PropEntry, PropValueOwned, Property,
};
use sombra_kernel::types::{
    ConstraintValidationError, LabelId, NodeId, PropId, Result, SombraError, ValidationFailure,
};

const PERSON: LabelId = LabelId(1);
const EMPLOYEE: LabelId = LabelId(2);
const EMAIL: PropId = PropId(1);
const NAME: PropId = PropId(2);

type Writer = ConstraintEnforcingWriter<Graph, Graph, Graph>;

fn setup(constraints: &[(LabelId, PropId)]) -> Result<(Graph, Writer)> {
    let graph = Graph::new(KernelOptions::default());
    let tx = graph.begin();
    for (label, prop) in constraints {
        graph.create_uniqueness_constraint(&tx.statement(), *label, *prop)?;
    }
    tx.commit()?;
    let writer = graph.enforcing_writer();
    Ok((graph, writer))
}

fn labelled_node(
    graph: &Graph,
    writer: &Writer,
    label: LabelId,
    email: impl Into<PropValueOwned>,
) -> Result<NodeId> {
    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, label)?;
    writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, email))?;
    tx.commit()?;
    Ok(node)
}

fn violation(err: &SombraError) -> Option<(LabelId, PropId, &PropValueOwned, NodeId)> {
    match err.constraint_failure()? {
        ConstraintValidationError::UniquenessViolation {
            label,
            prop,
            value,
            existing,
        } => Some((*label, *prop, value, *existing)),
        _ => None,
    }
}

#[test]
fn second_person_with_same_email_is_rejected() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let a = labelled_node(&graph, &writer, PERSON, "x@y.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let b = graph.create_node(&stmt)?;
    assert!(writer.node_add_label(&stmt, b, PERSON)?);
    let err = writer
        .node_set_property(&stmt, b, PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    let (label, prop, value, existing) = violation(&err).expect("uniqueness violation");
    assert_eq!((label, prop, existing), (PERSON, EMAIL, a));
    assert_eq!(value, &PropValueOwned::from("x@y.com"));

    // The rejected write never reached the store.
    assert_eq!(
        graph.node_get_property(&stmt, b, EMAIL)?,
        Property::undefined(EMAIL)
    );
    Ok(())
}

#[test]
fn adding_constrained_label_checks_existing_value() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let a = labelled_node(&graph, &writer, PERSON, "x@y.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let c = graph.create_node(&stmt)?;
    writer.node_set_property(&stmt, c, PropEntry::new(EMAIL, "x@y.com"))?;
    let err = writer.node_add_label(&stmt, c, PERSON).unwrap_err();
    assert_eq!(violation(&err).map(|v| v.3), Some(a));
    assert!(!graph.node_has_label(&stmt, c, PERSON)?);
    Ok(())
}

#[test]
fn missing_property_passes_vacuously() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    labelled_node(&graph, &writer, PERSON, "x@y.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    writer.node_set_property(&stmt, node, PropEntry::new(NAME, "x@y.com"))?;
    assert!(writer.node_add_label(&stmt, node, PERSON)?);
    assert!(!writer.node_add_label(&stmt, node, PERSON)?);
    tx.commit()?;
    Ok(())
}

#[test]
fn unconstrained_label_and_property_are_not_checked() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    labelled_node(&graph, &writer, EMPLOYEE, "x@y.com")?;
    labelled_node(&graph, &writer, EMPLOYEE, "x@y.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;
    writer.node_set_property(&stmt, node, PropEntry::new(NAME, "Ann"))?;
    let other = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, other, PERSON)?;
    writer.node_set_property(&stmt, other, PropEntry::new(NAME, "Ann"))?;
    tx.commit()?;
    Ok(())
}

#[test]
fn duplicate_within_one_transaction_is_rejected() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let tx = graph.begin();
    let stmt = tx.statement();
    let first = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, first, PERSON)?;
    writer.node_set_property(&stmt, first, PropEntry::new(EMAIL, "x@y.com"))?;

    let second = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, second, PERSON)?;
    let err = writer
        .node_set_property(&stmt, second, PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    assert_eq!(violation(&err).map(|v| v.3), Some(first));
    Ok(())
}

#[test]
fn rewriting_own_value_is_allowed() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let a = labelled_node(&graph, &writer, PERSON, "x@y.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let previous = writer.node_set_property(&stmt, a, PropEntry::new(EMAIL, "x@y.com"))?;
    assert_eq!(previous, Property::defined(EMAIL, "x@y.com"));
    writer.node_remove_label(&stmt, a, PERSON)?;
    assert!(writer.node_add_label(&stmt, a, PERSON)?);
    tx.commit()?;
    Ok(())
}

#[test]
fn setting_same_value_twice_in_one_transaction_is_allowed() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;
    writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;
    assert_eq!(
        writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?,
        Property::defined(EMAIL, "x@y.com")
    );

    // The node's own value does not shield a second node.
    let other = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, other, PERSON)?;
    let err = writer
        .node_set_property(&stmt, other, PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    assert_eq!(violation(&err).map(|v| v.3), Some(node));
    tx.commit()?;
    Ok(())
}

#[test]
fn constraint_on_each_label_is_checked() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL), (EMPLOYEE, EMAIL)])?;
    let employee = labelled_node(&graph, &writer, EMPLOYEE, "x@y.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    writer.node_add_label(&stmt, node, PERSON)?;
    writer.node_add_label(&stmt, node, EMPLOYEE)?;
    let err = writer
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    let (label, _, _, existing) = violation(&err).expect("uniqueness violation");
    assert_eq!((label, existing), (EMPLOYEE, employee));
    Ok(())
}

#[test]
fn values_of_different_types_do_not_collide() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    labelled_node(&graph, &writer, PERSON, 1i64)?;
    labelled_node(&graph, &writer, PERSON, 1.0f64)?;
    labelled_node(&graph, &writer, PERSON, "1")?;
    labelled_node(&graph, &writer, PERSON, ArrayValue::Int(vec![1]))?;
    labelled_node(&graph, &writer, PERSON, ArrayValue::Float(vec![1.0]))?;
    labelled_node(&graph, &writer, PERSON, true)?;
    Ok(())
}

#[test]
fn zero_and_negative_zero_share_a_value() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    labelled_node(&graph, &writer, PERSON, 0.0f64)?;
    let err = labelled_node(&graph, &writer, PERSON, -0.0f64).unwrap_err();
    assert!(violation(&err).is_some(), "{err}");
    Ok(())
}

#[test]
fn nan_cannot_be_validated() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let err = labelled_node(&graph, &writer, PERSON, f64::NAN).unwrap_err();
    assert!(matches!(
        err.constraint_failure(),
        Some(ConstraintValidationError::UnableToValidate {
            source: ValidationFailure::Unindexable(_),
            ..
        })
    ));
    Ok(())
}

#[test]
fn deleting_holder_frees_the_value() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let a = labelled_node(&graph, &writer, PERSON, "x@y.com")?;

    let tx = graph.begin();
    writer.node_delete(&tx.statement(), a)?;
    tx.commit()?;

    labelled_node(&graph, &writer, PERSON, "x@y.com")?;
    Ok(())
}

#[test]
fn missing_node_is_reported_as_not_found() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    let tx = graph.begin();
    let stmt = tx.statement();
    let err = writer
        .node_set_property(&stmt, NodeId(404), PropEntry::new(EMAIL, "x@y.com"))
        .unwrap_err();
    assert!(matches!(err, SombraError::EntityNotFound { id: 404, .. }));
    let err = writer.node_add_label(&stmt, NodeId(404), PERSON).unwrap_err();
    assert!(matches!(err, SombraError::EntityNotFound { id: 404, .. }));
    Ok(())
}

#[test]
fn outcomes_are_counted() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let graph = Graph::new(KernelOptions::new().metrics(metrics.clone()));
    let tx = graph.begin();
    graph.create_uniqueness_constraint(&tx.statement(), PERSON, EMAIL)?;
    tx.commit()?;
    let writer = graph.enforcing_writer();

    labelled_node(&graph, &writer, PERSON, "x@y.com")?;
    assert!(labelled_node(&graph, &writer, PERSON, "x@y.com").is_err());

    assert_eq!(CounterMetrics::load(&metrics.validations_passed), 1);
    assert_eq!(CounterMetrics::load(&metrics.uniqueness_violations), 1);
    assert_eq!(CounterMetrics::load(&metrics.locks_acquired), 2);
    Ok(())
}

#[test]
fn raw_writer_bypasses_validation() -> Result<()> {
    let (graph, writer) = setup(&[(PERSON, EMAIL)])?;
    labelled_node(&graph, &writer, PERSON, "x@y.com")?;

    let tx = graph.begin();
    let stmt = tx.statement();
    let node = graph.create_node(&stmt)?;
    writer.inner().node_add_label(&stmt, node, PERSON)?;
    writer
        .inner()
        .node_set_property(&stmt, node, PropEntry::new(EMAIL, "x@y.com"))?;
    assert_eq!(
        graph.node_get_all_properties(&stmt, node)?,
        vec![PropEntry::new(EMAIL, "x@y.com")]
    );
    Ok(())
}
