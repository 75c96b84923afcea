//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::types::{Timestamp, TransactionId};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

impl TransactionState {
    /// Returns true for `Committed` and `Aborted`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Active
    }
}

/// A transaction handle.
///
/// Owned by the caller driving the transaction. Its read and write sets are
/// private to that caller; the engine only sees them through the `&mut`
/// borrow passed to each operation.
///
/// An active transaction holds locks for every key it wrote. Dropping the
/// handle without committing or aborting leaves those locks held, so always
/// finish it through the engine.
#[derive(Debug)]
pub struct Transaction {
    /// Transaction ID.
    id: TransactionId,
    /// Snapshot timestamp (reads see commits at or before this point).
    start_ts: Timestamp,
    /// Current state.
    state: TransactionState,
    /// Keys read, for commit-time validation.
    reads: BTreeSet<String>,
    /// Buffered writes: key -> latest value.
    writes: BTreeMap<String, Bytes>,
    /// Timestamp assigned at commit.
    commit_ts: Option<Timestamp>,
}

impl Transaction {
    /// Creates a new transaction.
    pub(crate) fn new(id: TransactionId, start_ts: Timestamp) -> Self {
        Self {
            id,
            start_ts,
            state: TransactionState::Active,
            reads: BTreeSet::new(),
            writes: BTreeMap::new(),
            commit_ts: None,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the snapshot timestamp.
    #[must_use]
    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the commit timestamp once committed.
    #[must_use]
    pub fn commit_ts(&self) -> Option<Timestamp> {
        self.commit_ts
    }

    /// Returns the keys tracked for validation, sorted.
    pub fn read_set(&self) -> impl Iterator<Item = &str> {
        self.reads.iter().map(String::as_str)
    }

    /// Returns the buffered writes, sorted by key.
    pub fn write_set(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.writes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of keys written.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns this transaction's buffered value for `key`.
    #[must_use]
    pub fn pending_write(&self, key: &str) -> Option<&Bytes> {
        self.writes.get(key)
    }

    /// Tracks a read.
    ///
    /// Returns false if the read set is full and the key was not tracked.
    pub(crate) fn record_read(&mut self, key: &str, limit: Option<usize>) -> bool {
        if self.reads.contains(key) {
            return true;
        }
        if limit.is_some_and(|max| self.reads.len() >= max) {
            return false;
        }
        self.reads.insert(key.to_owned());
        true
    }

    /// Records a buffered write.
    pub(crate) fn record_write(&mut self, key: &str, value: Bytes) {
        self.writes.insert(key.to_owned(), value);
    }

    /// Marks the transaction as committed.
    pub(crate) fn mark_committed(&mut self, ts: Timestamp) {
        self.state = TransactionState::Committed;
        self.commit_ts = Some(ts);
    }

    /// Marks the transaction as aborted.
    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
    }

    /// Ensures the transaction is active.
    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::inactive(self.id, self.state))
        }
    }
}

/// The engine's retained record of a transaction.
///
/// Records stay in the transaction table after the transaction finishes so
/// they can be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Transaction ID.
    pub id: TransactionId,
    /// Snapshot timestamp.
    pub start_ts: Timestamp,
    /// State at the last transition.
    pub state: TransactionState,
    /// Commit timestamp, if committed.
    pub commit_ts: Option<Timestamp>,
}

impl From<&Transaction> for TransactionInfo {
    fn from(txn: &Transaction) -> Self {
        Self {
            id: txn.id,
            start_ts: txn.start_ts,
            state: txn.state,
            commit_ts: txn.commit_ts,
        }
    }
}
