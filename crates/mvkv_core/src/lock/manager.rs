//! Blocking lock acquisition.

use super::LockAttempt;
use crate::error::{CoreError, CoreResult};
use crate::stats::EngineStats;
use crate::transaction::EngineState;
use crate::types::TransactionId;
use parking_lot::{Condvar, MutexGuard};
use std::time::Duration;
use tracing::{trace, warn};

/// Drives acquisition attempts until the lock is granted or a deadlock is found.
///
/// Between attempts the engine mutex is released for at most one retry
/// interval. Releasing locks notifies waiters so they retry early.
#[derive(Debug)]
pub(crate) struct LockManager {
    released: Condvar,
    retry_interval: Duration,
}

impl LockManager {
    pub(crate) fn new(retry_interval: Duration) -> Self {
        Self {
            released: Condvar::new(),
            retry_interval,
        }
    }

    /// Locks `key` for `txid`, waiting while another transaction holds it.
    pub(crate) fn acquire(
        &self,
        state: &mut MutexGuard<'_, EngineState>,
        stats: &EngineStats,
        txid: TransactionId,
        key: &str,
    ) -> CoreResult<()> {
        let mut waited = false;
        loop {
            match state.locks.try_acquire(txid, key) {
                LockAttempt::Acquired | LockAttempt::AlreadyHeld => return Ok(()),
                LockAttempt::Blocked { owner } => {
                    if !waited {
                        stats.record_lock_wait();
                        waited = true;
                    }
                    trace!(%txid, key, %owner, "lock busy, waiting");
                    self.released.wait_for(state, self.retry_interval);
                }
                LockAttempt::Deadlock { owner, cycle } => {
                    stats.record_deadlock();
                    warn!(%txid, key, %owner, ?cycle, "deadlock detected, failing acquisition");
                    return Err(CoreError::deadlock(txid, key));
                }
            }
        }
    }

    /// Wakes every waiter. Call after releasing locks.
    pub(crate) fn notify_released(&self) {
        self.released.notify_all();
    }
}
