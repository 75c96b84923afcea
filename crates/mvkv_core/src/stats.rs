//! Engine statistics.
//!
//! Counters are updated as transactions run and can be read at any time
//! without taking the engine lock.
//!
//! # Usage
//!
//! ```rust
//! use mvkv_core::Engine;
//!
//! let engine = Engine::new();
//! let mut txn = engine.begin();
//! engine.write(&mut txn, "k", "v").unwrap();
//! engine.commit(&mut txn).unwrap();
//!
//! let stats = engine.stats().snapshot();
//! assert_eq!(stats.transactions_committed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct EngineStats {
    // Operation counters
    /// Reads served.
    reads: AtomicU64,
    /// Writes buffered.
    writes: AtomicU64,

    // Transaction counters
    /// Transactions started.
    transactions_started: AtomicU64,
    /// Transactions committed.
    transactions_committed: AtomicU64,
    /// Transactions aborted, for any reason.
    transactions_aborted: AtomicU64,

    // Contention counters
    /// Lock acquisitions that had to wait at least once.
    lock_waits: AtomicU64,
    /// Acquisitions failed by deadlock detection.
    deadlocks: AtomicU64,
    /// Commits rejected by read set validation.
    conflicts: AtomicU64,

    /// Versions removed by compaction.
    versions_compacted: AtomicU64,
}

impl EngineStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_wait(&self) {
        self.lock_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deadlock(&self) {
        self.deadlocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self, removed: u64) {
        self.versions_compacted.fetch_add(removed, Ordering::Relaxed);
    }

    /// Returns the number of reads served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of writes buffered.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted.
    pub fn transactions_aborted(&self) -> u64 {
        self.transactions_aborted.load(Ordering::Relaxed)
    }

    /// Returns the number of acquisitions that waited.
    ///
    /// High values mean writers are contending for the same keys.
    pub fn lock_waits(&self) -> u64 {
        self.lock_waits.load(Ordering::Relaxed)
    }

    /// Returns the number of deadlocks broken.
    pub fn deadlocks(&self) -> u64 {
        self.deadlocks.load(Ordering::Relaxed)
    }

    /// Returns the number of commits rejected by validation.
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Returns the number of versions removed by compaction.
    pub fn versions_compacted(&self) -> u64 {
        self.versions_compacted.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_aborted: self.transactions_aborted(),
            lock_waits: self.lock_waits(),
            deadlocks: self.deadlocks(),
            conflicts: self.conflicts(),
            versions_compacted: self.versions_compacted(),
        }
    }
}

/// A point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Reads served.
    pub reads: u64,
    /// Writes buffered.
    pub writes: u64,
    /// Transactions started.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions aborted.
    pub transactions_aborted: u64,
    /// Acquisitions that waited.
    pub lock_waits: u64,
    /// Deadlocks broken.
    pub deadlocks: u64,
    /// Commits rejected by validation.
    pub conflicts: u64,
    /// Versions removed by compaction.
    pub versions_compacted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = EngineStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_transactions() {
        let stats = EngineStats::new();

        stats.record_transaction_start();
        stats.record_transaction_start();
        stats.record_transaction_commit();
        stats.record_transaction_abort();
        stats.record_deadlock();

        let snap = stats.snapshot();
        assert_eq!(snap.transactions_started, 2);
        assert_eq!(snap.transactions_committed, 1);
        assert_eq!(snap.transactions_aborted, 1);
        assert_eq!(snap.deadlocks, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(EngineStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_read();
                        s.record_write();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.reads(), 800);
        assert_eq!(stats.writes(), 800);
    }
}
