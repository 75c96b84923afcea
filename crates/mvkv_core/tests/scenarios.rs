//! End-to-end transaction scenarios.

use bytes::Bytes;
use mvkv_core::{
    CoreError, CoreResult, Engine, EngineConfig, Timestamp, Transaction, TransactionState,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn seeded_engine() -> Engine {
    let config = EngineConfig::new().lock_retry_interval(Duration::from_millis(1));
    Engine::with_keys(config, [("A", "initialA"), ("B", "initialB")]).unwrap()
}

fn value(s: &'static str) -> Option<Bytes> {
    Some(Bytes::from_static(s.as_bytes()))
}

#[test]
fn sequential_transactions_see_prior_commits() {
    let engine = seeded_engine();

    let mut t1 = engine.begin();
    assert_eq!(engine.read(&mut t1, "A").unwrap(), value("initialA"));
    engine.write(&mut t1, "A", "val1").unwrap();
    assert_eq!(engine.read(&mut t1, "A").unwrap(), value("val1"));
    let ts1 = engine.commit(&mut t1).unwrap();

    let mut t2 = engine.begin();
    assert_eq!(t2.start_ts(), ts1);
    assert_eq!(engine.read(&mut t2, "A").unwrap(), value("val1"));
    engine.write(&mut t2, "B", "val2").unwrap();
    let ts2 = engine.commit(&mut t2).unwrap();
    assert!(ts2 > ts1);

    let mut t3 = engine.begin();
    assert_eq!(engine.read(&mut t3, "A").unwrap(), value("val1"));
    assert_eq!(engine.read(&mut t3, "B").unwrap(), value("val2"));
    engine.commit(&mut t3).unwrap();
}

#[test]
fn read_then_foreign_commit_fails_validation() {
    let engine = seeded_engine();

    let mut t1 = engine.begin();
    engine.read(&mut t1, "A").unwrap();

    let mut t2 = engine.begin();
    engine.write(&mut t2, "A", "t2").unwrap();
    engine.commit(&mut t2).unwrap();

    engine.write(&mut t1, "B", "t1").unwrap();
    let err = engine.commit(&mut t1).unwrap_err();
    assert!(matches!(err, CoreError::ReadWriteConflict { .. }));

    let mut check = engine.begin();
    assert_eq!(engine.read(&mut check, "B").unwrap(), value("initialB"));
}

#[test]
fn abort_leaves_no_trace() {
    let engine = seeded_engine();
    let before = engine.version_count("A");

    let mut txn = engine.begin();
    engine.write(&mut txn, "A", "x").unwrap();
    engine.write(&mut txn, "A", "y").unwrap();
    engine.abort(&mut txn);

    assert_eq!(engine.version_count("A"), before);
    assert_eq!(engine.lock_owner("A"), None);
    let mut reader = engine.begin();
    assert_eq!(engine.read(&mut reader, "A").unwrap(), value("initialA"));
}

#[test]
fn inactive_transaction_reports_error() {
    let engine = seeded_engine();
    let mut txn = engine.begin();
    engine.abort(&mut txn);

    let err = engine.read(&mut txn, "A").unwrap_err();
    assert!(matches!(
        err,
        CoreError::InactiveTransaction {
            state: TransactionState::Aborted,
            ..
        }
    ));
}

/// Writes `first`, waits for the peer, sleeps, then writes `second` and commits.
fn crossing_worker(
    engine: &Engine,
    barrier: &Barrier,
    keys: (&str, &str),
    val: &'static str,
    delay: Duration,
) -> CoreResult<Timestamp> {
    let mut txn = engine.begin();
    let result = run_crossing(engine, &mut txn, barrier, keys, val, delay);
    if result.is_err() {
        engine.abort(&mut txn);
    }
    result
}

fn run_crossing(
    engine: &Engine,
    txn: &mut Transaction,
    barrier: &Barrier,
    (first, second): (&str, &str),
    val: &'static str,
    delay: Duration,
) -> CoreResult<Timestamp> {
    engine.write(txn, first, val)?;
    barrier.wait();
    thread::sleep(delay);
    engine.write(txn, second, val)?;
    engine.commit(txn)
}

#[test]
fn crossing_writers_one_deadlocks_one_commits() {
    let engine = Arc::new(seeded_engine());
    let barrier = Arc::new(Barrier::new(2));

    let x = {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            crossing_worker(&engine, &barrier, ("A", "B"), "x", Duration::from_millis(60))
        })
    };
    let y = {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            crossing_worker(&engine, &barrier, ("B", "A"), "y", Duration::from_millis(20))
        })
    };

    let results = [x.join().unwrap(), y.join().unwrap()];
    let committed: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    let deadlocked: Vec<_> = results
        .iter()
        .filter(|r| matches!(r, Err(CoreError::DeadlockDetected { .. })))
        .collect();
    assert_eq!(committed.len(), 1);
    assert_eq!(deadlocked.len(), 1);

    let winner = if results[0].is_ok() { "x" } else { "y" };
    let mut reader = engine.begin();
    let a = engine.read(&mut reader, "A").unwrap().unwrap();
    let b = engine.read(&mut reader, "B").unwrap().unwrap();
    assert_eq!(a, winner.as_bytes());
    assert_eq!(b, winner.as_bytes());

    assert_eq!(engine.stats().deadlocks(), 1);
    assert_eq!(engine.wait_edge_count(), 0);
    assert_eq!(engine.lock_owner("A"), None);
    assert_eq!(engine.lock_owner("B"), None);
}

#[test]
fn three_way_cycle_has_exactly_one_victim() {
    let engine = Arc::new(seeded_engine());
    engine.create_key("C", "initialC").unwrap();
    let barrier = Arc::new(Barrier::new(3));

    let plans = [
        (("A", "B"), "1", 10u64),
        (("B", "C"), "2", 30),
        (("C", "A"), "3", 60),
    ];
    let handles: Vec<_> = plans
        .into_iter()
        .map(|(keys, val, delay)| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                crossing_worker(&engine, &barrier, keys, val, Duration::from_millis(delay))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let victims = results
        .iter()
        .filter(|r| matches!(r, Err(CoreError::DeadlockDetected { .. })))
        .count();
    assert_eq!(victims, 1);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
}

#[test]
fn concurrent_commits_get_distinct_timestamps() {
    let engine = Arc::new(seeded_engine());
    let threads = 8;
    let per_thread = 25;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let key = format!("k{t}");
                (0..per_thread)
                    .map(|i| engine.transaction(|tx| tx.write(&key, format!("{i}"))))
                    .collect::<CoreResult<Vec<()>>>()
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap().unwrap();
    }

    assert_eq!(
        engine.current_commit_ts(),
        Timestamp::new(1 + (threads * per_thread) as u64)
    );

    let mut seen = HashSet::new();
    let mut last = Timestamp::INITIAL;
    for raw in 1..=(threads * per_thread) as u64 {
        let info = engine
            .transaction_info(mvkv_core::TransactionId::new(raw))
            .unwrap();
        let ts = info.commit_ts.unwrap();
        assert!(seen.insert(ts), "duplicate commit timestamp {ts}");
        last = last.max(ts);
    }
    assert_eq!(last, engine.current_commit_ts());
}

#[test]
fn readers_never_observe_partial_commits() {
    let engine = Arc::new(seeded_engine());
    engine
        .transaction(|tx| {
            tx.write("A", "0")?;
            tx.write("B", "0")
        })
        .unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 1..=200 {
                let v = i.to_string();
                engine
                    .transaction(|tx| {
                        tx.write("A", v.clone())?;
                        tx.write("B", v.clone())
                    })
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    let mut txn = engine.begin();
                    let a = engine.read(&mut txn, "A").unwrap();
                    let b = engine.read(&mut txn, "B").unwrap();
                    assert_eq!(a, b);
                    engine.abort(&mut txn);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}

#[test]
fn closure_swallowing_deadlock_still_releases_locks() {
    let engine = Arc::new(seeded_engine());
    let a_locked = Arc::new(Barrier::new(2));

    let waiter = {
        let engine = Arc::clone(&engine);
        let a_locked = Arc::clone(&a_locked);
        thread::spawn(move || {
            let mut txn = engine.begin();
            engine.write(&mut txn, "B", "waiter").unwrap();
            a_locked.wait();
            engine.write(&mut txn, "A", "waiter").unwrap();
            engine.commit(&mut txn).unwrap()
        })
    };

    let result: CoreResult<()> = engine.transaction(|tx| {
        tx.write("A", "closure")?;
        a_locked.wait();
        while engine.wait_edge_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        let lost = tx.write("B", "closure");
        assert!(matches!(lost, Err(CoreError::DeadlockDetected { .. })));
        Ok(())
    });

    assert!(matches!(
        result,
        Err(CoreError::InactiveTransaction {
            state: TransactionState::Aborted,
            ..
        })
    ));

    let waiter_ts = waiter.join().unwrap();
    assert_eq!(engine.current_commit_ts(), waiter_ts);
    assert_eq!(engine.lock_owner("A"), None);
    assert_eq!(engine.lock_owner("B"), None);
    assert_eq!(engine.active_count(), 0);

    let mut reader = engine.begin();
    assert_eq!(engine.read(&mut reader, "A").unwrap(), value("waiter"));
    assert_eq!(engine.read(&mut reader, "B").unwrap(), value("waiter"));
}
