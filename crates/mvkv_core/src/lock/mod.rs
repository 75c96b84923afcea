//! Pessimistic write locking with deadlock detection.
//!
//! Only writers lock. A lock is exclusive per key and is held until its
//! owner commits or aborts. A blocked writer records a wait-for edge and
//! checks the graph for a cycle on every attempt; the attempt that finds a
//! cycle fails with [`CoreError::DeadlockDetected`](crate::CoreError). Victim
//! choice therefore depends on attempt order, not on transaction age or the
//! amount of work done.

mod manager;
mod table;
mod wait_for;

pub(crate) use manager::LockManager;
pub use table::LockTable;
pub use wait_for::WaitForGraph;

use crate::types::TransactionId;

/// Outcome of a single, non-blocking acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    /// The key was free and is now held.
    Acquired,
    /// The key was already held by the requester.
    AlreadyHeld,
    /// Another transaction holds the key; a wait-for edge was recorded.
    Blocked {
        /// The current holder.
        owner: TransactionId,
    },
    /// Waiting would close a cycle; the requester's edges were cleared.
    Deadlock {
        /// The current holder.
        owner: TransactionId,
        /// The transactions along the cycle.
        cycle: Vec<TransactionId>,
    },
}

/// Lock table and wait-for graph, mutated together.
#[derive(Debug, Default)]
pub struct LockState {
    table: LockTable,
    waits: WaitForGraph,
}

impl LockState {
    /// Creates an empty lock state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes one attempt to lock `key` for `txid`.
    pub fn try_acquire(&mut self, txid: TransactionId, key: &str) -> LockAttempt {
        match self.table.owner(key) {
            None => {
                self.table.grant(key, txid);
                self.waits.clear_waiter(txid);
                LockAttempt::Acquired
            }
            Some(owner) if owner == txid => LockAttempt::AlreadyHeld,
            Some(owner) => {
                self.waits.add_edge(txid, owner);
                match self.waits.find_cycle() {
                    Some(cycle) => {
                        self.waits.clear_waiter(txid);
                        LockAttempt::Deadlock { owner, cycle }
                    }
                    None => LockAttempt::Blocked { owner },
                }
            }
        }
    }

    /// Releases every lock of `txid` and drops it from the wait-for graph.
    pub fn release(&mut self, txid: TransactionId) -> Vec<String> {
        self.waits.remove_transaction(txid);
        self.table.release_all(txid)
    }

    /// Returns the lock table.
    #[must_use]
    pub fn table(&self) -> &LockTable {
        &self.table
    }

    /// Returns the wait-for graph.
    #[must_use]
    pub fn waits(&self) -> &WaitForGraph {
        &self.waits
    }
}
