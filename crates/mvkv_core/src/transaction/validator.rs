//! Commit-time read set validation.

use crate::error::{CoreError, CoreResult};
use crate::store::VersionStore;
use crate::transaction::Transaction;

/// Checks that nothing `txn` read has been committed since its snapshot.
///
/// Only the newest committed version of each key in the read set is
/// inspected. Pending versions are skipped: the committing transaction's own
/// write may sit on top of a chain it also read.
pub(crate) fn validate(store: &VersionStore, txn: &Transaction) -> CoreResult<()> {
    for key in txn.read_set() {
        if let Some(ts) = store.newest_commit_ts(key) {
            if ts > txn.start_ts() {
                return Err(CoreError::conflict(txn.id(), key));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Timestamp, TransactionId};
    use bytes::Bytes;

    fn store_with_a() -> VersionStore {
        let mut store = VersionStore::new();
        store.create_key("A", Bytes::from_static(b"a")).unwrap();
        store
    }

    fn commit(store: &mut VersionStore, txid: u64, key: &str, ts: u64) {
        let txid = TransactionId::new(txid);
        store.buffer_write(txid, key, Bytes::from_static(b"x"));
        store.stamp_commit(txid, Timestamp::new(ts));
    }

    #[test]
    fn unchanged_read_set_passes() {
        let store = store_with_a();
        let mut txn = Transaction::new(TransactionId::new(1), Timestamp::INITIAL);
        txn.record_read("A", None);
        assert!(validate(&store, &txn).is_ok());
    }

    #[test]
    fn newer_commit_is_a_conflict() {
        let mut store = store_with_a();
        let mut txn = Transaction::new(TransactionId::new(1), Timestamp::INITIAL);
        txn.record_read("A", None);
        commit(&mut store, 2, "A", 2);

        let err = validate(&store, &txn).unwrap_err();
        assert!(matches!(err, CoreError::ReadWriteConflict { ref key, .. } if key == "A"));
    }

    #[test]
    fn own_pending_version_does_not_hide_conflict() {
        let mut store = store_with_a();
        let txid = TransactionId::new(1);
        let mut txn = Transaction::new(txid, Timestamp::INITIAL);
        txn.record_read("A", None);
        commit(&mut store, 2, "A", 2);
        store.buffer_write(txid, "A", Bytes::from_static(b"mine"));

        assert!(validate(&store, &txn).is_err());
    }

    #[test]
    fn key_created_after_snapshot_conflicts() {
        let mut store = VersionStore::new();
        let mut txn = Transaction::new(TransactionId::new(1), Timestamp::new(3));
        txn.record_read("fresh", None);
        assert!(validate(&store, &txn).is_ok());

        commit(&mut store, 2, "fresh", 4);
        assert!(validate(&store, &txn).is_err());
    }

    #[test]
    fn untracked_keys_are_not_validated() {
        let mut store = store_with_a();
        let txn = Transaction::new(TransactionId::new(1), Timestamp::INITIAL);
        commit(&mut store, 2, "A", 2);
        assert!(validate(&store, &txn).is_ok());
    }
}
