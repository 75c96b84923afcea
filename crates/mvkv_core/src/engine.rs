//! Engine facade.

use crate::config::EngineConfig;
use crate::error::CoreResult;
use crate::stats::EngineStats;
use crate::transaction::{Transaction, TransactionInfo, TransactionManager};
use crate::types::{Timestamp, TransactionId};
use bytes::Bytes;

/// The main engine handle.
///
/// `Engine` is the entry point for running transactions against the
/// in-memory store. It is `Send + Sync`; share it between threads with an
/// `Arc` and drive one transaction per thread.
///
/// # Example
///
/// ```rust
/// use mvkv_core::{Engine, EngineConfig};
///
/// let engine = Engine::with_keys(EngineConfig::default(), [("A", "initialA")]).unwrap();
///
/// let mut txn = engine.begin();
/// assert_eq!(engine.read(&mut txn, "A").unwrap().as_deref(), Some(&b"initialA"[..]));
/// engine.write(&mut txn, "A", "val1").unwrap();
/// engine.commit(&mut txn).unwrap();
///
/// let value = engine.transaction(|tx| tx.read("A")).unwrap();
/// assert_eq!(value.as_deref(), Some(&b"val1"[..]));
/// ```
#[derive(Debug)]
pub struct Engine {
    txn_manager: TransactionManager,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an empty engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an empty engine.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            txn_manager: TransactionManager::new(config),
        }
    }

    /// Creates an engine pre-populated with committed keys.
    ///
    /// # Errors
    ///
    /// Returns `KeyExists` if a key name repeats.
    pub fn with_keys<I, K, V>(config: EngineConfig, keys: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Bytes>,
    {
        let engine = Self::with_config(config);
        for (name, value) in keys {
            engine.create_key(name.as_ref(), value)?;
        }
        Ok(engine)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.txn_manager.config()
    }

    /// Returns the statistics counters.
    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        self.txn_manager.stats()
    }

    /// Creates a key whose value is visible to every transaction.
    ///
    /// # Errors
    ///
    /// Returns `KeyExists` if the key is already present.
    pub fn create_key(&self, name: &str, initial: impl Into<Bytes>) -> CoreResult<()> {
        self.txn_manager.create_key(name, initial)
    }

    /// Begins a new transaction.
    pub fn begin(&self) -> Transaction {
        self.txn_manager.begin()
    }

    /// Reads a key within a transaction.
    pub fn read(&self, txn: &mut Transaction, key: &str) -> CoreResult<Option<Bytes>> {
        self.txn_manager.read(txn, key)
    }

    /// Writes a key within a transaction.
    ///
    /// # Errors
    ///
    /// Returns `DeadlockDetected` if waiting for the key's lock would
    /// deadlock. The transaction is then aborted but keeps its resources
    /// until [`abort`](Self::abort) is called.
    pub fn write(
        &self,
        txn: &mut Transaction,
        key: &str,
        value: impl Into<Bytes>,
    ) -> CoreResult<()> {
        self.txn_manager.write(txn, key, value)
    }

    /// Commits a transaction.
    ///
    /// # Errors
    ///
    /// Returns `DeadlockDetected` or `ReadWriteConflict`; the transaction
    /// has been rolled back when either is returned.
    pub fn commit(&self, txn: &mut Transaction) -> CoreResult<Timestamp> {
        self.txn_manager.commit(txn)
    }

    /// Aborts a transaction. Safe to call more than once.
    pub fn abort(&self, txn: &mut Transaction) {
        self.txn_manager.abort(txn);
    }

    /// Runs `f` in a new transaction.
    ///
    /// Commits if `f` returns `Ok`, aborts otherwise. A failed commit is
    /// also aborted, so no locks outlive the call.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut TransactionScope<'_>) -> CoreResult<T>,
    {
        let mut txn = self.begin();
        let mut scope = TransactionScope {
            manager: &self.txn_manager,
            txn: &mut txn,
        };
        let result = f(&mut scope).and_then(|value| self.commit(&mut txn).map(|_| value));

        if result.is_err() {
            self.abort(&mut txn);
        }
        result
    }

    /// Returns the retained record of a transaction.
    #[must_use]
    pub fn transaction_info(&self, txid: TransactionId) -> Option<TransactionInfo> {
        self.txn_manager.transaction_info(txid)
    }

    /// Returns the timestamp of the latest commit.
    #[must_use]
    pub fn current_commit_ts(&self) -> Timestamp {
        self.txn_manager.current_commit_ts()
    }

    /// Returns the number of active transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.txn_manager.active_count()
    }

    /// Returns the transaction holding the lock on `key`.
    #[must_use]
    pub fn lock_owner(&self, key: &str) -> Option<TransactionId> {
        self.txn_manager.lock_owner(key)
    }

    /// Returns the number of edges in the wait-for graph.
    #[must_use]
    pub fn wait_edge_count(&self) -> usize {
        self.txn_manager.wait_edge_count()
    }

    /// Returns the number of versions stored for `key`.
    #[must_use]
    pub fn version_count(&self, key: &str) -> usize {
        self.txn_manager.version_count(key)
    }

    /// Returns all key names, sorted.
    #[must_use]
    pub fn key_names(&self) -> Vec<String> {
        self.txn_manager.key_names()
    }

    /// Prunes versions no snapshot can read any more.
    ///
    /// Returns the number of versions removed. Read results are unchanged.
    pub fn compact(&self) -> usize {
        self.txn_manager.compact()
    }
}

/// A transaction bound to its engine, handed to [`Engine::transaction`] closures.
pub struct TransactionScope<'a> {
    manager: &'a TransactionManager,
    txn: &'a mut Transaction,
}

impl TransactionScope<'_> {
    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.txn.id()
    }

    /// Returns the snapshot timestamp.
    #[must_use]
    pub fn start_ts(&self) -> Timestamp {
        self.txn.start_ts()
    }

    /// Reads a key.
    pub fn read(&mut self, key: &str) -> CoreResult<Option<Bytes>> {
        self.manager.read(self.txn, key)
    }

    /// Writes a key.
    pub fn write(&mut self, key: &str, value: impl Into<Bytes>) -> CoreResult<()> {
        self.manager.write(self.txn, key, value)
    }
}
