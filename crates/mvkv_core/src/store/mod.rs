//! Multi-version key store.
//!
//! Every key owns a [`VersionChain`]. Writers never overwrite: they add a
//! pending version that only they can see, and the commit protocol later
//! stamps it with a commit timestamp. Readers pick the newest version their
//! snapshot allows, so a reader never waits behind an in-flight writer.
//!
//! Chains grow without bound until [`VersionStore::compact`] is run.

mod chain;

pub use chain::{Version, VersionChain, VersionState};

use crate::error::{CoreError, CoreResult};
use crate::types::{Timestamp, TransactionId};
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};

/// Version chains for all keys.
#[derive(Debug, Default)]
pub struct VersionStore {
    /// Key name -> versions.
    chains: HashMap<String, VersionChain>,
    /// Keys carrying a pending version, per owning transaction.
    pending: HashMap<TransactionId, BTreeSet<String>>,
}

impl VersionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a key whose initial value is committed at [`Timestamp::INITIAL`].
    pub fn create_key(&mut self, name: &str, initial: Bytes) -> CoreResult<()> {
        if self.chains.contains_key(name) {
            return Err(CoreError::key_exists(name));
        }
        self.chains
            .insert(name.to_owned(), VersionChain::with_initial(initial));
        Ok(())
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.chains.contains_key(name)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.chains.len()
    }

    /// Returns all key names, sorted.
    #[must_use]
    pub fn key_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.chains.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a key's chain.
    #[must_use]
    pub fn chain(&self, name: &str) -> Option<&VersionChain> {
        self.chains.get(name)
    }

    /// Reads `name` as seen by `txid` at `snapshot`.
    ///
    /// `None` means no version is visible, which includes unknown keys.
    #[must_use]
    pub fn read(&self, txid: TransactionId, snapshot: Timestamp, name: &str) -> Option<Bytes> {
        self.chains
            .get(name)?
            .visible(txid, snapshot)
            .map(|v| v.value().clone())
    }

    /// Buffers an uncommitted value for `txid`.
    ///
    /// An unknown key is created first with an empty committed value. That
    /// version is stamped at the first commit timestamp and survives an abort
    /// of the writer, so a snapshot that read the key as missing may later
    /// see it as empty. Validation does not report this; it is the accepted
    /// limit on snapshot stability for lazily created keys.
    pub fn buffer_write(&mut self, txid: TransactionId, name: &str, value: Bytes) {
        let chain = self
            .chains
            .entry(name.to_owned())
            .or_insert_with(|| VersionChain::with_initial(Bytes::new()));
        chain.buffer(txid, value);
        self.pending
            .entry(txid)
            .or_default()
            .insert(name.to_owned());
    }

    /// Returns the commit timestamp of the newest committed version of `name`.
    #[must_use]
    pub fn newest_commit_ts(&self, name: &str) -> Option<Timestamp> {
        self.chains.get(name)?.newest_commit_ts()
    }

    /// Publishes every pending version of `txid` at `ts`.
    ///
    /// Returns the number of versions published.
    pub fn stamp_commit(&mut self, txid: TransactionId, ts: Timestamp) -> usize {
        let Some(keys) = self.pending.remove(&txid) else {
            return 0;
        };
        let mut published = 0;
        for name in &keys {
            if let Some(chain) = self.chains.get_mut(name) {
                published += chain.stamp(txid, ts);
            }
        }
        published
    }

    /// Unlinks every pending version of `txid`.
    ///
    /// Returns the number of versions removed.
    pub fn discard_aborted(&mut self, txid: TransactionId) -> usize {
        let Some(keys) = self.pending.remove(&txid) else {
            return 0;
        };
        let mut removed = 0;
        for name in &keys {
            if let Some(chain) = self.chains.get_mut(name) {
                removed += chain.discard(txid);
            }
        }
        removed
    }

    /// Returns true if `txid` has any pending version.
    #[must_use]
    pub fn has_pending(&self, txid: TransactionId) -> bool {
        self.pending.contains_key(&txid)
    }

    /// Returns the number of versions stored for `name`.
    #[must_use]
    pub fn version_count(&self, name: &str) -> usize {
        self.chains.get(name).map_or(0, VersionChain::len)
    }

    /// Prunes versions no snapshot at or after `horizon` can read.
    ///
    /// Returns the number of versions removed.
    pub fn compact(&mut self, horizon: Timestamp) -> usize {
        self.chains
            .values_mut()
            .map(|chain| chain.prune(horizon))
            .sum()
    }
}
