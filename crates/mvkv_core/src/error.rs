//! Error types for mvkv core.

use crate::transaction::TransactionState;
use crate::types::TransactionId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in mvkv core operations.
///
/// Every error is scoped to a single transaction. None of them leave the
/// engine in an unusable state; callers recover by starting a new transaction.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A lock acquisition closed a cycle in the wait-for graph.
    ///
    /// The transaction that observed the cycle is the victim.
    #[error("deadlock detected: {txid} waiting for key {key:?}")]
    DeadlockDetected {
        /// The transaction chosen as the victim.
        txid: TransactionId,
        /// The key it was trying to lock.
        key: String,
    },

    /// Commit-time validation found a newer committed version of a key read
    /// by the transaction.
    #[error("read-write conflict: {txid} read key {key:?} which was committed after its snapshot")]
    ReadWriteConflict {
        /// The transaction that failed validation.
        txid: TransactionId,
        /// The key whose committed version moved.
        key: String,
    },

    /// The operation requires an active transaction.
    #[error("{txid} is not active (state: {state:?})")]
    InactiveTransaction {
        /// The transaction.
        txid: TransactionId,
        /// Its current state.
        state: TransactionState,
    },

    /// A key with this name already exists.
    #[error("key already exists: {key:?}")]
    KeyExists {
        /// The key name.
        key: String,
    },

    /// The key does not exist and lazy key creation is disabled.
    #[error("key not found: {key:?}")]
    KeyNotFound {
        /// The key name.
        key: String,
    },
}

impl CoreError {
    /// Creates a deadlock error.
    pub fn deadlock(txid: TransactionId, key: impl Into<String>) -> Self {
        Self::DeadlockDetected {
            txid,
            key: key.into(),
        }
    }

    /// Creates a read-write conflict error.
    pub fn conflict(txid: TransactionId, key: impl Into<String>) -> Self {
        Self::ReadWriteConflict {
            txid,
            key: key.into(),
        }
    }

    /// Creates an inactive transaction error.
    pub fn inactive(txid: TransactionId, state: TransactionState) -> Self {
        Self::InactiveTransaction { txid, state }
    }

    /// Creates a key exists error.
    pub fn key_exists(key: impl Into<String>) -> Self {
        Self::KeyExists { key: key.into() }
    }

    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Returns true if the failure was a lost lock acquisition.
    #[must_use]
    pub fn is_lock_failure(&self) -> bool {
        matches!(self, Self::DeadlockDetected { .. })
    }

    /// Returns true if retrying the work in a fresh transaction may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DeadlockDetected { .. } | Self::ReadWriteConflict { .. }
        )
    }
}
