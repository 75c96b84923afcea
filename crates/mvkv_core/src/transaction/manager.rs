//! Transaction manager.

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::lock::{LockManager, LockState};
use crate::stats::EngineStats;
use crate::store::VersionStore;
use crate::transaction::state::{Transaction, TransactionInfo, TransactionState};
use crate::transaction::validator;
use crate::types::{Timestamp, TransactionId};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Everything shared between transactions, guarded by one mutex.
#[derive(Debug)]
pub(crate) struct EngineState {
    /// Version chains.
    pub(crate) store: VersionStore,
    /// Lock table and wait-for graph.
    pub(crate) locks: LockState,
    /// Timestamp of the latest commit; new snapshots start here.
    pub(crate) commit_ts: Timestamp,
    /// Next transaction ID.
    pub(crate) next_txid: u64,
    /// Every transaction ever begun.
    pub(crate) table: HashMap<TransactionId, TransactionInfo>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            store: VersionStore::new(),
            locks: LockState::new(),
            commit_ts: Timestamp::INITIAL,
            next_txid: 1,
            table: HashMap::new(),
        }
    }

    fn record(&mut self, txn: &Transaction) {
        self.table.insert(txn.id(), TransactionInfo::from(txn));
    }

    fn active(&self) -> impl Iterator<Item = &TransactionInfo> {
        self.table
            .values()
            .filter(|info| info.state == TransactionState::Active)
    }
}

/// Runs the begin/read/write/commit/abort protocol.
///
/// The transaction manager provides:
/// - Snapshot reads that never wait on writers
/// - Exclusive write locks with deadlock detection
/// - Backward validation of the read set at commit
/// - Commit ordering via a single commit timestamp counter
///
/// ## Commit protocol
///
/// Under the engine mutex a commit (1) acquires any write lock not yet
/// held, (2) validates the read set, and (3) takes the next commit
/// timestamp, stamps every pending version with it and releases the locks.
/// A failure in (1) or (2) rolls the transaction back before the error is
/// returned, so no partial commit is ever visible.
pub struct TransactionManager {
    config: EngineConfig,
    state: Mutex<EngineState>,
    locks: LockManager,
    stats: EngineStats,
}

impl TransactionManager {
    /// Creates a new transaction manager with an empty store.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            locks: LockManager::new(config.lock_retry_interval),
            config,
            state: Mutex::new(EngineState::new()),
            stats: EngineStats::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the statistics counters.
    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Creates a key with a committed initial value.
    pub fn create_key(&self, name: &str, initial: impl Into<Bytes>) -> CoreResult<()> {
        self.state.lock().store.create_key(name, initial.into())
    }

    /// Begins a new transaction.
    ///
    /// The transaction sees every commit made before this call.
    pub fn begin(&self) -> Transaction {
        let txn = {
            let mut state = self.state.lock();
            let txid = TransactionId::new(state.next_txid);
            state.next_txid += 1;
            let txn = Transaction::new(txid, state.commit_ts);
            state.record(&txn);
            txn
        };

        self.stats.record_transaction_start();
        debug!(txid = %txn.id(), start_ts = %txn.start_ts(), "begin");
        txn
    }

    /// Reads a key at the transaction's snapshot.
    ///
    /// The transaction's own buffered write wins over committed versions.
    /// `None` means no version is visible. The key joins the read set.
    pub fn read(&self, txn: &mut Transaction, key: &str) -> CoreResult<Option<Bytes>> {
        txn.ensure_active()?;

        let value = self
            .state
            .lock()
            .store
            .read(txn.id(), txn.start_ts(), key);

        if !txn.record_read(key, self.config.max_read_set) {
            trace!(txid = %txn.id(), key, "read set full, read not tracked");
        }
        self.stats.record_read();
        trace!(txid = %txn.id(), key, found = value.is_some(), "read");
        Ok(value)
    }

    /// Locks a key and buffers a new version of it.
    ///
    /// Blocks while another transaction holds the key. If waiting would
    /// deadlock, the transaction becomes `Aborted` and
    /// [`CoreError::DeadlockDetected`] is returned; its locks and buffered
    /// versions stay in place until [`abort`](Self::abort) is called.
    pub fn write(&self, txn: &mut Transaction, key: &str, value: impl Into<Bytes>) -> CoreResult<()> {
        txn.ensure_active()?;
        let value = value.into();

        let mut state = self.state.lock();
        if !self.config.create_missing_keys && !state.store.contains_key(key) {
            return Err(CoreError::key_not_found(key));
        }
        if let Err(err) = self.locks.acquire(&mut state, &self.stats, txn.id(), key) {
            self.mark_aborted(&mut state, txn);
            return Err(err);
        }
        state.store.buffer_write(txn.id(), key, value.clone());
        drop(state);

        txn.record_write(key, value);
        self.stats.record_write();
        trace!(txid = %txn.id(), key, "write buffered");
        Ok(())
    }

    /// Commits a transaction and returns its commit timestamp.
    ///
    /// On lock failure or read-write conflict the transaction is rolled back
    /// and the error returned.
    pub fn commit(&self, txn: &mut Transaction) -> CoreResult<Timestamp> {
        txn.ensure_active()?;
        let txid = txn.id();

        let mut state = self.state.lock();

        let locked = txn
            .write_set()
            .try_for_each(|(key, _)| self.locks.acquire(&mut state, &self.stats, txid, key));
        if let Err(err) = locked {
            self.rollback(&mut state, txn);
            return Err(err);
        }

        if let Err(err) = validator::validate(&state.store, txn) {
            self.stats.record_conflict();
            warn!(%txid, error = %err, "validation failed");
            self.rollback(&mut state, txn);
            return Err(err);
        }

        let commit_ts = state.commit_ts.next();
        state.commit_ts = commit_ts;
        let published = state.store.stamp_commit(txid, commit_ts);
        state.locks.release(txid);
        txn.mark_committed(commit_ts);
        state.record(txn);
        drop(state);

        self.locks.notify_released();
        self.stats.record_transaction_commit();
        debug!(%txid, %commit_ts, published, "committed");
        Ok(commit_ts)
    }

    /// Aborts a transaction.
    ///
    /// Discards its buffered versions and releases its locks. Aborting a
    /// committed transaction, or one already rolled back, does nothing.
    pub fn abort(&self, txn: &mut Transaction) {
        if txn.state() == TransactionState::Committed {
            return;
        }
        let mut state = self.state.lock();
        self.rollback(&mut state, txn);
    }

    /// Returns the retained record of a transaction.
    #[must_use]
    pub fn transaction_info(&self, txid: TransactionId) -> Option<TransactionInfo> {
        self.state.lock().table.get(&txid).copied()
    }

    /// Returns the timestamp of the latest commit.
    #[must_use]
    pub fn current_commit_ts(&self) -> Timestamp {
        self.state.lock().commit_ts
    }

    /// Returns the number of active transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.state.lock().active().count()
    }

    /// Returns the transaction holding the lock on `key`.
    #[must_use]
    pub fn lock_owner(&self, key: &str) -> Option<TransactionId> {
        self.state.lock().locks.table().owner(key)
    }

    /// Returns the number of wait-for edges.
    #[must_use]
    pub fn wait_edge_count(&self) -> usize {
        self.state.lock().locks.waits().edge_count()
    }

    /// Returns the number of versions stored for `key`.
    #[must_use]
    pub fn version_count(&self, key: &str) -> usize {
        self.state.lock().store.version_count(key)
    }

    /// Returns all key names, sorted.
    #[must_use]
    pub fn key_names(&self) -> Vec<String> {
        self.state.lock().store.key_names()
    }

    /// Prunes versions that no active or future snapshot can read.
    ///
    /// Returns the number of versions removed.
    pub fn compact(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let horizon = state
                .active()
                .map(|info| info.start_ts)
                .min()
                .unwrap_or(state.commit_ts);
            state.store.compact(horizon)
        };

        self.stats.record_compaction(removed as u64);
        debug!(removed, "compacted version chains");
        removed
    }

    fn mark_aborted(&self, state: &mut EngineState, txn: &mut Transaction) {
        txn.mark_aborted();
        state.record(txn);
        self.stats.record_transaction_abort();
        debug!(txid = %txn.id(), "aborted");
    }

    fn rollback(&self, state: &mut EngineState, txn: &mut Transaction) {
        let txid = txn.id();
        let discarded = state.store.discard_aborted(txid);
        let released = state.locks.release(txid);
        if txn.is_active() {
            self.mark_aborted(state, txn);
        }
        if !released.is_empty() {
            trace!(%txid, discarded, released = released.len(), "rolled back");
            self.locks.notify_released();
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("commit_ts", &self.current_commit_ts())
            .field("active_count", &self.active_count())
            .finish_non_exhaustive()
    }
}
