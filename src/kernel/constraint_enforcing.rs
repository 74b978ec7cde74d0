use std::sync::Arc;

use tracing::{debug, warn};

use crate::primitives::concurrency::IndexEntryLock;
use crate::storage::index::{IndexDescriptor, IndexState, ValueKey};
use crate::storage::{default_metrics, ConstraintMetrics, PropEntry, Property};
use crate::types::{
    ConstraintValidationError, EdgeId, LabelId, NodeId, PropId, Result, SombraError,
    ValidationFailure,
};

use super::operations::{EntityRead, EntityWrite, SchemaRead};
use super::Statement;

/// Entity writer that enforces uniqueness constraints before delegating.
///
/// Wraps a raw [`EntityWrite`] and is itself an [`EntityWrite`]. Adding a label
/// and setting a node property are validated against every uniqueness
/// constraint they touch; every other operation is forwarded untouched.
///
/// Validation of one `(label, prop, value)` runs in a fixed order:
///
/// 1. the backing index must be `Online`;
/// 2. the index-entry lock for the value is acquired through the statement;
/// 3. the index is searched for another node already holding the value.
///
/// The lock is taken before the lookup so that two transactions writing the same
/// value serialize, and the second one looks up after the first has committed.
/// Locks are never released here; the transaction releases them when it ends.
pub struct ConstraintEnforcingWriter<W, R, S> {
    writer: W,
    entities: R,
    schema: S,
    metrics: Arc<dyn ConstraintMetrics>,
}

impl<W, R, S> ConstraintEnforcingWriter<W, R, S>
where
    W: EntityWrite,
    R: EntityRead,
    S: SchemaRead,
{
    /// Composes a validating writer over the given collaborators.
    pub fn new(writer: W, entities: R, schema: S) -> Self {
        Self::with_metrics(writer, entities, schema, default_metrics())
    }

    /// Like [`Self::new`], reporting validation outcomes to `metrics`.
    pub fn with_metrics(
        writer: W,
        entities: R,
        schema: S,
        metrics: Arc<dyn ConstraintMetrics>,
    ) -> Self {
        Self {
            writer,
            entities,
            schema,
            metrics,
        }
    }

    /// Raw writer this coordinator delegates to.
    pub fn inner(&self) -> &W {
        &self.writer
    }

    fn validate_no_existing_node(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        label: LabelId,
        entry: &PropEntry,
    ) -> Result<()> {
        let index = IndexDescriptor::new(label, entry.prop);
        match self.check_for_conflict(stmt, node, &index, entry) {
            Ok(()) => {
                self.metrics.validation_passed();
                Ok(())
            }
            Err(err) => {
                let err = wrap_infrastructure(index, err);
                if let SombraError::ConstraintValidation(failure) = &err {
                    self.record_rejection(stmt, &index, failure);
                }
                Err(err)
            }
        }
    }

    fn check_for_conflict(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        index: &IndexDescriptor,
        entry: &PropEntry,
    ) -> Result<()> {
        self.verify_index_online(stmt, index)?;
        let lock = IndexEntryLock::new(index.label, index.prop, ValueKey::encode(&entry.value)?);
        stmt.locks().acquire_index_entry_write_lock(stmt.tx(), &lock)?;
        self.metrics.lock_acquired();
        debug!(tx = stmt.tx().0, %lock, "constraint.validate.lock_acquired");
        let existing = self
            .entities
            .nodes_from_index_lookup(stmt, index, &entry.value)?
            .into_iter()
            .find(|candidate| *candidate != node);
        match existing {
            Some(existing) => Err(ConstraintValidationError::UniquenessViolation {
                label: index.label,
                prop: index.prop,
                value: entry.value.clone(),
                existing,
            }
            .into()),
            None => Ok(()),
        }
    }

    fn verify_index_online(&self, stmt: &Statement<'_>, index: &IndexDescriptor) -> Result<()> {
        match self.schema.index_state(stmt, index)? {
            IndexState::Online => Ok(()),
            IndexState::Populating => {
                Err(ConstraintValidationError::SchemaDataConflict { index: *index }.into())
            }
            IndexState::Failed => {
                let failure = self.schema.index_failure(stmt, index)?;
                Err(ConstraintValidationError::IndexBroken {
                    index: *index,
                    failure,
                }
                .into())
            }
        }
    }

    fn record_rejection(
        &self,
        stmt: &Statement<'_>,
        index: &IndexDescriptor,
        failure: &ConstraintValidationError,
    ) {
        match failure {
            ConstraintValidationError::UniquenessViolation { existing, .. } => {
                self.metrics.uniqueness_violation();
                debug!(
                    tx = stmt.tx().0,
                    %index,
                    existing = existing.0,
                    "constraint.validate.violation"
                );
            }
            ConstraintValidationError::SchemaDataConflict { .. } => {
                self.metrics.index_not_online(IndexState::Populating);
                debug!(tx = stmt.tx().0, %index, "constraint.validate.index_populating");
            }
            ConstraintValidationError::IndexBroken { failure, .. } => {
                self.metrics.index_not_online(IndexState::Failed);
                warn!(tx = stmt.tx().0, %index, %failure, "constraint.validate.index_broken");
            }
            ConstraintValidationError::UnableToValidate { source, .. } => {
                self.metrics.unable_to_validate();
                warn!(tx = stmt.tx().0, %index, %source, "constraint.validate.unable");
            }
        }
    }
}

/// Folds infrastructure failures raised while validating into
/// [`ConstraintValidationError::UnableToValidate`], including a transaction
/// that ended under the statement. Outcomes of validation and errors about the
/// target entity pass through unchanged.
fn wrap_infrastructure(index: IndexDescriptor, err: SombraError) -> SombraError {
    let source = match err {
        SombraError::IndexNotFound(_) => ValidationFailure::IndexNotFound,
        SombraError::LockTimeout { waited_ms, .. } => ValidationFailure::LockTimeout { waited_ms },
        SombraError::Invalid(reason) => ValidationFailure::Unindexable(reason),
        SombraError::TransactionClosed(tx) => ValidationFailure::TransactionClosed(tx),
        other => return other,
    };
    ConstraintValidationError::UnableToValidate { index, source }.into()
}

impl<W, R, S> EntityWrite for ConstraintEnforcingWriter<W, R, S>
where
    W: EntityWrite,
    R: EntityRead,
    S: SchemaRead,
{
    fn node_add_label(&self, stmt: &Statement<'_>, node: NodeId, label: LabelId) -> Result<bool> {
        for constraint in self.schema.constraints_for_label(stmt, label)? {
            if let Property::Defined(entry) =
                self.entities.node_get_property(stmt, node, constraint.prop)?
            {
                self.validate_no_existing_node(stmt, node, label, &entry)?;
            }
        }
        self.writer.node_add_label(stmt, node, label)
    }

    fn node_set_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        entry: PropEntry,
    ) -> Result<Property> {
        for label in self.entities.node_get_labels(stmt, node)? {
            let constraints = self
                .schema
                .constraints_for_label_and_prop(stmt, label, entry.prop)?;
            if !constraints.is_empty() {
                self.validate_no_existing_node(stmt, node, label, &entry)?;
            }
        }
        self.writer.node_set_property(stmt, node, entry)
    }

    fn node_delete(&self, stmt: &Statement<'_>, node: NodeId) -> Result<()> {
        self.writer.node_delete(stmt, node)
    }

    fn relationship_delete(&self, stmt: &Statement<'_>, edge: EdgeId) -> Result<()> {
        self.writer.relationship_delete(stmt, edge)
    }

    fn node_remove_label(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        self.writer.node_remove_label(stmt, node, label)
    }

    fn relationship_set_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        entry: PropEntry,
    ) -> Result<Property> {
        self.writer.relationship_set_property(stmt, edge, entry)
    }

    fn graph_set_property(&self, stmt: &Statement<'_>, entry: PropEntry) -> Result<Property> {
        self.writer.graph_set_property(stmt, entry)
    }

    fn node_remove_property(
        &self,
        stmt: &Statement<'_>,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property> {
        self.writer.node_remove_property(stmt, node, prop)
    }

    fn relationship_remove_property(
        &self,
        stmt: &Statement<'_>,
        edge: EdgeId,
        prop: PropId,
    ) -> Result<Property> {
        self.writer.relationship_remove_property(stmt, edge, prop)
    }

    fn graph_remove_property(&self, stmt: &Statement<'_>, prop: PropId) -> Result<Property> {
        self.writer.graph_remove_property(stmt, prop)
    }
}
