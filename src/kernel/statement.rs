use std::fmt;

use crate::primitives::concurrency::Locks;
use crate::types::TxId;

/// Transactional context passed to every kernel operation.
///
/// A statement scopes reads and writes to one transaction and carries the lock
/// client that transaction acquires index-entry locks through. Locks taken via a
/// statement outlive it; they are released when the owning transaction commits
/// or rolls back.
#[derive(Clone, Copy)]
pub struct Statement<'a> {
    tx: TxId,
    locks: &'a dyn Locks,
}

impl<'a> Statement<'a> {
    /// Creates a statement for `tx` acquiring locks through `locks`.
    pub fn new(tx: TxId, locks: &'a dyn Locks) -> Self {
        Self { tx, locks }
    }

    /// Transaction the statement runs in.
    pub fn tx(&self) -> TxId {
        self.tx
    }

    /// Lock client of the owning transaction.
    pub fn locks(&self) -> &'a dyn Locks {
        self.locks
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement").field("tx", &self.tx).finish()
    }
}
