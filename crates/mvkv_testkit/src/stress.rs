//! Stress tests for the mvkv engine.
//!
//! These runs drive the engine from many threads at once and check the
//! invariants that must survive contention, deadlock victims and
//! validation failures.

use bytes::Bytes;
use mvkv_core::{CoreResult, Engine};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use crate::fixtures::{engine_with_keys, key_names};

/// Attempts made for one operation before it counts as failed.
pub const MAX_ATTEMPTS: usize = 64;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Attempts that hit a retryable error and were run again.
    pub retries: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, retries: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            retries,
            duration,
            ops_per_second,
        }
    }

    /// Logs a summary of the run.
    pub fn log_summary(&self, name: &str) {
        info!(
            run = name,
            total = self.total_ops,
            successful = self.successful_ops,
            failed = self.failed_ops,
            retries = self.retries,
            duration = ?self.duration,
            ops_per_second = self.ops_per_second,
            "stress run finished"
        );
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform, split across threads.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct account keys.
    pub accounts: usize,
    /// Balance every account starts with.
    pub initial_balance: i64,
    /// Seed for the per-thread random generators.
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            accounts: 16,
            initial_balance: 1_000,
            seed: 0x6d76_6b76,
        }
    }
}

impl StressConfig {
    /// Creates an engine holding the configured accounts.
    pub fn engine(&self) -> Engine {
        engine_with_keys(self.accounts, &self.initial_balance.to_string())
    }

    /// Returns the sum all balances must keep.
    #[must_use]
    pub fn expected_total(&self) -> i64 {
        self.initial_balance * self.accounts as i64
    }
}

/// Decodes a balance stored as decimal text. Missing or malformed values
/// count as zero.
#[must_use]
pub fn parse_balance(value: Option<&Bytes>) -> i64 {
    value
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Sums every account balance from one snapshot.
///
/// The snapshot is read and then aborted, so this may run while writers
/// are still active.
pub fn total_balance(engine: &Engine, accounts: usize) -> CoreResult<i64> {
    let mut txn = engine.begin();
    let mut total = 0;
    for key in key_names(accounts) {
        match engine.read(&mut txn, &key) {
            Ok(value) => total += parse_balance(value.as_ref()),
            Err(err) => {
                engine.abort(&mut txn);
                return Err(err);
            }
        }
    }
    engine.abort(&mut txn);
    Ok(total)
}

/// Moves `amount` from one account to another in a single transaction.
pub fn transfer(engine: &Engine, from: &str, to: &str, amount: i64) -> CoreResult<()> {
    engine.transaction(|tx| {
        let from_balance = parse_balance(tx.read(from)?.as_ref());
        let to_balance = parse_balance(tx.read(to)?.as_ref());
        tx.write(from, (from_balance - amount).to_string())?;
        tx.write(to, (to_balance + amount).to_string())
    })
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or
/// exhausts [`MAX_ATTEMPTS`]. Returns whether it succeeded.
fn with_retries(retries: &AtomicUsize, mut op: impl FnMut() -> CoreResult<()>) -> bool {
    for _ in 0..MAX_ATTEMPTS {
        match op() {
            Ok(()) => return true,
            Err(err) if err.is_retryable() => {
                retries.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => return false,
        }
    }
    false
}

/// Run concurrent random transfers between accounts.
///
/// Each transfer reads and writes two accounts, so crossing transfers
/// deadlock and overlapping ones fail validation. Both are retried.
pub fn stress_transfers(engine: Arc<Engine>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let retries = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);
    let accounts = key_names(config.accounts.max(2));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let retries = Arc::clone(&retries);
            let accounts = accounts.clone();
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));

            thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    let from = rng.gen_range(0..accounts.len());
                    let to = (from + rng.gen_range(1..accounts.len())) % accounts.len();
                    let amount = rng.gen_range(1..=10);

                    let ok = with_retries(&retries, || {
                        transfer(&engine, &accounts[from], &accounts[to], amount)
                    });
                    if ok {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        retries.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run concurrent snapshot audits while one writer keeps transferring.
///
/// An audit succeeds when its snapshot sums to the expected total.
pub fn stress_concurrent_reads(engine: Arc<Engine>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let retries = Arc::new(AtomicUsize::new(0));
    let readers = config.threads.saturating_sub(1).max(1);
    let ops_per_thread = config.operations / readers;
    let expected = config.expected_total();

    let writer = {
        let engine = Arc::clone(&engine);
        let retries = Arc::clone(&retries);
        let accounts = key_names(config.accounts.max(2));
        let mut rng = StdRng::seed_from_u64(config.seed);
        let transfers = ops_per_thread;

        thread::spawn(move || {
            for _ in 0..transfers {
                let from = rng.gen_range(0..accounts.len());
                let to = (from + 1) % accounts.len();
                with_retries(&retries, || transfer(&engine, &accounts[from], &accounts[to], 1));
            }
        })
    };

    let start = Instant::now();

    let handles: Vec<_> = (0..readers)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let accounts = config.accounts;

            thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    match total_balance(&engine, accounts) {
                        Ok(total) if total == expected => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    writer.join().expect("Thread panicked");

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        retries.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run transactions that abort on purpose, checking nothing leaks.
pub fn stress_transaction_aborts(engine: &Engine, config: &StressConfig) -> StressTestResult {
    let accounts = key_names(config.accounts.max(1));

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = &accounts[i % accounts.len()];
        let should_fail = i % 2 == 0;

        let result = engine.transaction(|tx| {
            let balance = parse_balance(tx.read(key)?.as_ref());
            tx.write(key, (balance + 1).to_string())?;
            if should_fail {
                Err(mvkv_core::CoreError::key_not_found(key.as_str()))
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, 0, start.elapsed())
}
