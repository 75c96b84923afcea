//! Per-key version chains.

use crate::types::{Timestamp, TransactionId};
use bytes::Bytes;

/// Visibility tag of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    /// Published at the given commit timestamp.
    Committed(Timestamp),
    /// Buffered by a transaction that has not committed yet.
    Pending(TransactionId),
}

/// A single version of a key's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    state: VersionState,
    value: Bytes,
}

impl Version {
    /// Creates a committed version.
    #[must_use]
    pub fn committed(ts: Timestamp, value: Bytes) -> Self {
        Self {
            state: VersionState::Committed(ts),
            value,
        }
    }

    /// Creates a pending version owned by `txid`.
    #[must_use]
    pub fn pending(txid: TransactionId, value: Bytes) -> Self {
        Self {
            state: VersionState::Pending(txid),
            value,
        }
    }

    /// Returns the visibility tag.
    #[must_use]
    pub fn state(&self) -> VersionState {
        self.state
    }

    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Returns the commit timestamp, if committed.
    #[must_use]
    pub fn commit_ts(&self) -> Option<Timestamp> {
        match self.state {
            VersionState::Committed(ts) => Some(ts),
            VersionState::Pending(_) => None,
        }
    }

    /// Returns the owning transaction, if pending.
    #[must_use]
    pub fn owner(&self) -> Option<TransactionId> {
        match self.state {
            VersionState::Committed(_) => None,
            VersionState::Pending(txid) => Some(txid),
        }
    }

    /// Checks whether a transaction with the given snapshot sees this version.
    #[must_use]
    pub fn is_visible_to(&self, txid: TransactionId, snapshot: Timestamp) -> bool {
        match self.state {
            VersionState::Committed(ts) => ts <= snapshot,
            VersionState::Pending(owner) => owner == txid,
        }
    }
}

/// The versions of one key.
///
/// Stored oldest first so that new versions are a push; every public
/// iterator walks newest first. Committed timestamps never decrease towards
/// the newest end and pending versions always sit above every committed
/// one, because a pending version can only exist under its owner's
/// exclusive lock.
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    versions: Vec<Version>,
}

impl VersionChain {
    /// Creates a chain holding one committed initial value.
    #[must_use]
    pub fn with_initial(value: Bytes) -> Self {
        Self {
            versions: vec![Version::committed(Timestamp::INITIAL, value)],
        }
    }

    /// Walks the chain newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter().rev()
    }

    /// Returns the number of versions in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns true if the chain holds no versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Returns the newest version visible to `txid` at `snapshot`.
    #[must_use]
    pub fn visible(&self, txid: TransactionId, snapshot: Timestamp) -> Option<&Version> {
        self.iter().find(|v| v.is_visible_to(txid, snapshot))
    }

    /// Returns the newest version, committed or not.
    #[must_use]
    pub fn newest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Returns the timestamp of the newest committed version.
    #[must_use]
    pub fn newest_commit_ts(&self) -> Option<Timestamp> {
        self.iter().find_map(Version::commit_ts)
    }

    /// Buffers a value for `txid`.
    ///
    /// Returns true if a new version was added, false if the transaction's
    /// existing pending version was overwritten.
    pub fn buffer(&mut self, txid: TransactionId, value: Bytes) -> bool {
        if let Some(existing) = self
            .versions
            .iter_mut()
            .rev()
            .find(|v| v.owner() == Some(txid))
        {
            existing.value = value;
            return false;
        }
        self.versions.push(Version::pending(txid, value));
        true
    }

    /// Publishes the pending version of `txid` at `ts`.
    pub fn stamp(&mut self, txid: TransactionId, ts: Timestamp) -> usize {
        let mut stamped = 0;
        for version in &mut self.versions {
            if version.owner() == Some(txid) {
                version.state = VersionState::Committed(ts);
                stamped += 1;
            }
        }
        stamped
    }

    /// Unlinks every pending version of `txid`.
    pub fn discard(&mut self, txid: TransactionId) -> usize {
        let before = self.versions.len();
        self.versions.retain(|v| v.owner() != Some(txid));
        before - self.versions.len()
    }

    /// Drops committed versions hidden from every snapshot at or after `horizon`.
    ///
    /// The newest committed version at or below the horizon is kept since
    /// it is what such snapshots read.
    pub fn prune(&mut self, horizon: Timestamp) -> usize {
        let keep_from = self
            .versions
            .iter()
            .rposition(|v| matches!(v.commit_ts(), Some(ts) if ts <= horizon));
        match keep_from {
            Some(idx) => self.versions.drain(..idx).count(),
            None => 0,
        }
    }
}
