use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::storage::index::ValueKey;
use crate::types::{LabelId, PropId, Result, SombraError, TxId};

/// Serialization unit for writers of one constrained value: `(label, prop, value)`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct IndexEntryLock {
    /// Constrained label.
    pub label: LabelId,
    /// Constrained property key.
    pub prop: PropId,
    /// Canonical key of the value being written.
    pub value: ValueKey,
}

impl IndexEntryLock {
    /// Creates the lock key for `(label, prop, value)`.
    pub fn new(label: LabelId, prop: PropId, value: ValueKey) -> Self {
        Self { label, prop, value }
    }
}

impl fmt::Display for IndexEntryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index-entry(label={}, prop={}, value={})",
            self.label, self.prop, self.value
        )
    }
}

/// Lock capability the write path depends on.
///
/// Locks are owned by a transaction and held until [`Locks::release_all`] is
/// called for it at commit or rollback. Acquiring a lock the transaction already
/// holds succeeds immediately.
pub trait Locks: Send + Sync {
    /// Acquires an exclusive lock on `lock` for `tx`, blocking while another
    /// transaction holds it.
    fn acquire_index_entry_write_lock(&self, tx: TxId, lock: &IndexEntryLock) -> Result<()>;

    /// Releases every lock held by `tx` and wakes waiters.
    fn release_all(&self, tx: TxId);
}

/// Snapshot of lock table state for observability.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSnapshot {
    /// Number of index-entry locks currently held.
    pub held: usize,
    /// Number of transactions holding at least one lock.
    pub owners: usize,
    /// Number of threads blocked waiting for a lock.
    pub waiting: usize,
}

#[derive(Default)]
struct LockTable {
    owners: FxHashMap<IndexEntryLock, TxId>,
    held: FxHashMap<TxId, Vec<IndexEntryLock>>,
    waiting: usize,
}

/// In-process exclusive lock manager for index entries.
///
/// There is no deadlock detection. Two transactions that take the locks for
/// `x` and `y` in opposite order wait on each other; without a wait timeout
/// neither ever returns. Callers that validate several values per transaction
/// should configure one, and a timed-out acquisition surfaces as
/// [`SombraError::LockTimeout`].
pub struct IndexEntryLocks {
    state: Mutex<LockTable>,
    released: Condvar,
    wait_timeout: Option<Duration>,
}

impl IndexEntryLocks {
    /// Creates a lock manager whose waiters block indefinitely.
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// Creates a lock manager whose waiters give up after `wait_timeout`.
    pub fn with_timeout(wait_timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            wait_timeout,
        }
    }

    /// Locks currently held by `tx`, in acquisition order.
    pub fn held_by(&self, tx: TxId) -> Vec<IndexEntryLock> {
        let state = self.state.lock();
        state.held.get(&tx).cloned().unwrap_or_default()
    }

    /// Returns a snapshot of the current lock table.
    pub fn snapshot(&self) -> LockSnapshot {
        let state = self.state.lock();
        LockSnapshot {
            held: state.owners.len(),
            owners: state.held.len(),
            waiting: state.waiting,
        }
    }
}

impl Default for IndexEntryLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl Locks for IndexEntryLocks {
    fn acquire_index_entry_write_lock(&self, tx: TxId, lock: &IndexEntryLock) -> Result<()> {
        let started = Instant::now();
        let deadline = self.wait_timeout.map(|timeout| started + timeout);
        let mut state = self.state.lock();
        loop {
            match state.owners.get(lock) {
                None => {
                    state.owners.insert(lock.clone(), tx);
                    state.held.entry(tx).or_default().push(lock.clone());
                    return Ok(());
                }
                Some(owner) if *owner == tx => return Ok(()),
                Some(owner) => {
                    debug!(tx = tx.0, owner = owner.0, %lock, "locks.index_entry.wait");
                }
            }
            state.waiting += 1;
            let timed_out = match deadline {
                Some(deadline) => self.released.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.released.wait(&mut state);
                    false
                }
            };
            state.waiting -= 1;
            if timed_out && state.owners.get(lock).is_some_and(|owner| *owner != tx) {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                debug!(tx = tx.0, %lock, waited_ms, "locks.index_entry.timeout");
                return Err(SombraError::LockTimeout {
                    lock: lock.clone(),
                    waited_ms,
                });
            }
        }
    }

    fn release_all(&self, tx: TxId) {
        let released = {
            let mut state = self.state.lock();
            let Some(locks) = state.held.remove(&tx) else {
                return;
            };
            for lock in &locks {
                state.owners.remove(lock);
            }
            locks.len()
        };
        debug!(tx = tx.0, released, "locks.index_entry.release_all");
        self.released.notify_all();
    }
}
