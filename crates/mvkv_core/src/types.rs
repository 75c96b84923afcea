//! Core type definitions for mvkv.

use std::fmt;

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing and never reused, not even
/// for aborted transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Commit timestamp.
///
/// Timestamps order commits totally. A transaction's snapshot is the
/// timestamp of the latest commit at the time it began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Timestamp of versions installed by key creation.
    pub const INITIAL: Self = Self(1);

    /// Creates a new timestamp.
    #[must_use]
    pub const fn new(ts: u64) -> Self {
        Self(ts)
    }

    /// Returns the raw timestamp value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next timestamp.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_ordering() {
        let t1 = TransactionId::new(1);
        let t2 = TransactionId::new(2);
        assert!(t1 < t2);
    }

    #[test]
    fn timestamp_next() {
        let ts = Timestamp::new(5);
        assert_eq!(ts.next().as_u64(), 6);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", TransactionId::new(42)), "txn:42");
        assert_eq!(format!("{}", Timestamp::INITIAL), "ts:1");
    }
}
