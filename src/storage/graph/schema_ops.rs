use tracing::{info, warn};

use super::commit::populate;
use super::Graph;
use crate::kernel::Statement;
use crate::storage::index::{
    visible_indexes, IndexDescriptor, IndexKind, IndexState, UniquenessConstraint,
};
use crate::types::{LabelId, PropId, Result, SombraError};

impl Graph {
    /// Declares a uniqueness constraint on `(label, prop)` in the statement's
    /// transaction.
    ///
    /// The backing index reports `Populating` to the creating transaction until
    /// it commits, so that transaction cannot write constrained data. At commit
    /// the index is built from committed nodes unless population is deferred.
    pub fn create_uniqueness_constraint(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<UniquenessConstraint> {
        let constraint = UniquenessConstraint::new(label, prop);
        self.create_schema_index(stmt, constraint.index(), IndexKind::Unique)?;
        Ok(constraint)
    }

    /// Declares a non-unique property index on `(label, prop)`.
    pub fn create_index(
        &self,
        stmt: &Statement<'_>,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor> {
        let desc = IndexDescriptor::new(label, prop);
        self.create_schema_index(stmt, desc, IndexKind::General)?;
        Ok(desc)
    }

    /// Drops a uniqueness constraint together with its backing index.
    pub fn drop_uniqueness_constraint(
        &self,
        stmt: &Statement<'_>,
        constraint: UniquenessConstraint,
    ) -> Result<()> {
        self.drop_schema_index(stmt, constraint.index(), IndexKind::Unique)
    }

    /// Drops a non-unique property index.
    pub fn drop_index(&self, stmt: &Statement<'_>, desc: IndexDescriptor) -> Result<()> {
        self.drop_schema_index(stmt, desc, IndexKind::General)
    }

    /// Builds the committed index `desc` from committed nodes.
    ///
    /// Used when population was deferred at commit, or to retry a failed
    /// index after the offending data has been fixed.
    pub fn populate_index(&self, desc: IndexDescriptor) -> Result<IndexState> {
        let mut committed = self.inner.committed.write();
        populate(&mut committed, &desc)
    }

    /// Moves the committed index `desc` to `Failed` with `reason` as its
    /// stored failure description.
    pub fn mark_index_failed(&self, desc: IndexDescriptor, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        let mut committed = self.inner.committed.write();
        let index = committed
            .schema
            .get_mut(&desc)
            .ok_or(SombraError::IndexNotFound(desc))?;
        warn!(index = %desc, %reason, "graph.index.marked_failed");
        index.fail(reason);
        Ok(())
    }

    fn create_schema_index(
        &self,
        stmt: &Statement<'_>,
        desc: IndexDescriptor,
        kind: IndexKind,
    ) -> Result<()> {
        self.with_tx(stmt.tx(), |state, committed| {
            if visible_indexes(&committed.schema, &state.schema).any(|index| index.desc == desc) {
                return Err(SombraError::Invalid(
                    "an index already exists for this label and property",
                ));
            }
            state.schema.create(desc, kind);
            Ok(())
        })?;
        info!(tx = stmt.tx().0, index = %desc, kind = ?kind, "graph.schema.create");
        Ok(())
    }

    fn drop_schema_index(
        &self,
        stmt: &Statement<'_>,
        desc: IndexDescriptor,
        kind: IndexKind,
    ) -> Result<()> {
        self.with_tx(stmt.tx(), |state, committed| {
            let found = visible_indexes(&committed.schema, &state.schema)
                .any(|index| index.desc == desc && index.kind == kind);
            if !found {
                return Err(SombraError::IndexNotFound(desc));
            }
            let is_committed = committed.schema.get(&desc).is_some();
            state.schema.drop_index(desc, is_committed);
            Ok(())
        })?;
        info!(tx = stmt.tx().0, index = %desc, kind = ?kind, "graph.schema.drop");
        Ok(())
    }
}
