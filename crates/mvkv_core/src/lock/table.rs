//! Exclusive per-key lock ownership.

use crate::types::TransactionId;
use std::collections::{BTreeSet, HashMap};

/// Owner of each locked key and the keys held by each transaction.
#[derive(Debug, Default)]
pub struct LockTable {
    owners: HashMap<String, TransactionId>,
    held: HashMap<TransactionId, BTreeSet<String>>,
}

impl LockTable {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the owner of `key`, if locked.
    #[must_use]
    pub fn owner(&self, key: &str) -> Option<TransactionId> {
        self.owners.get(key).copied()
    }

    /// Grants `key` to `txid`. The key must be unlocked.
    pub fn grant(&mut self, key: &str, txid: TransactionId) {
        debug_assert!(!self.owners.contains_key(key), "key {key:?} already locked");
        self.owners.insert(key.to_owned(), txid);
        self.held.entry(txid).or_default().insert(key.to_owned());
    }

    /// Checks whether `txid` holds `key`.
    #[must_use]
    pub fn holds(&self, txid: TransactionId, key: &str) -> bool {
        self.owner(key) == Some(txid)
    }

    /// Returns the keys held by `txid`, sorted.
    pub fn held_by(&self, txid: TransactionId) -> impl Iterator<Item = &str> {
        self.held.get(&txid).into_iter().flatten().map(String::as_str)
    }

    /// Releases every key held by `txid` and returns them.
    pub fn release_all(&mut self, txid: TransactionId) -> Vec<String> {
        let keys: Vec<String> = self.held.remove(&txid).into_iter().flatten().collect();
        for key in &keys {
            self.owners.remove(key);
        }
        keys
    }

    /// Returns the number of locked keys.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.owners.len()
    }
}
