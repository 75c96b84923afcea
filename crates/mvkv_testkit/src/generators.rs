//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, values and transaction scripts, plus a
//! reference model that replays scripts with plain maps.

use bytes::Bytes;
use mvkv_core::{CoreResult, Engine};
use proptest::prelude::*;
use std::collections::HashMap;

/// Keys drawn by [`key_strategy`]. Kept small so scripts collide.
pub const SCRIPT_KEYS: [&str; 4] = ["a", "b", "c", "d"];

/// Strategy for generating keys from [`SCRIPT_KEYS`].
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(SCRIPT_KEYS.to_vec()).prop_map(str::to_owned)
}

/// Strategy for generating values (arbitrary bytes).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

/// A single step of a transaction script.
#[derive(Debug, Clone)]
pub enum ScriptOp {
    /// Read a key.
    Read {
        /// Key name.
        key: String,
    },
    /// Write a key.
    Write {
        /// Key name.
        key: String,
        /// New value.
        value: Vec<u8>,
    },
}

/// A transaction: some operations, then commit or abort.
#[derive(Debug, Clone)]
pub struct TxnScript {
    /// Operations in order.
    pub ops: Vec<ScriptOp>,
    /// Commit if true, abort otherwise.
    pub commit: bool,
}

/// Strategy for generating script operations.
pub fn script_op_strategy() -> impl Strategy<Value = ScriptOp> {
    prop_oneof![
        2 => key_strategy().prop_map(|key| ScriptOp::Read { key }),
        3 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| ScriptOp::Write { key, value }),
    ]
}

/// Strategy for generating a transaction script.
pub fn txn_script_strategy(max_ops: usize) -> impl Strategy<Value = TxnScript> {
    (
        prop::collection::vec(script_op_strategy(), 0..max_ops),
        prop::bool::weighted(0.75),
    )
        .prop_map(|(ops, commit)| TxnScript { ops, commit })
}

/// Strategy for generating a sequence of transaction scripts.
pub fn script_sequence_strategy(
    max_txns: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TxnScript>> {
    prop::collection::vec(txn_script_strategy(max_ops), 1..max_txns)
}

/// Committed state as plain maps, for checking the engine against.
///
/// Only valid for scripts run one after another; concurrent scripts need
/// the engine's conflict handling, which the model does not have.
#[derive(Debug, Clone, Default)]
pub struct ReferenceModel {
    committed: HashMap<String, Bytes>,
}

impl ReferenceModel {
    /// Creates a model holding the given committed keys.
    pub fn new<I, K, V>(keys: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Bytes>,
    {
        Self {
            committed: keys
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the committed value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.committed.get(key)
    }

    /// Runs `script` on both the engine and the model.
    ///
    /// Returns the reads observed by the engine alongside the reads the
    /// model expected, in script order.
    pub fn run(
        &mut self,
        engine: &Engine,
        script: &TxnScript,
    ) -> CoreResult<Vec<(Option<Bytes>, Option<Bytes>)>> {
        let mut txn = engine.begin();
        let mut local: HashMap<String, Bytes> = HashMap::new();
        let mut observed = Vec::new();

        for op in &script.ops {
            match op {
                ScriptOp::Read { key } => {
                    let got = engine.read(&mut txn, key)?;
                    let expected = local.get(key).or_else(|| self.get(key)).cloned();
                    observed.push((got, expected));
                }
                ScriptOp::Write { key, value } => {
                    let value = Bytes::from(value.clone());
                    engine.write(&mut txn, key, value.clone())?;
                    // Lazily created keys carry an empty committed value.
                    self.committed.entry(key.clone()).or_default();
                    local.insert(key.clone(), value);
                }
            }
        }

        if script.commit {
            engine.commit(&mut txn)?;
            self.committed.extend(local);
        } else {
            engine.abort(&mut txn);
        }
        Ok(observed)
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{seeded_engine, SEED_KEYS};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn key_is_from_script_keys(key in key_strategy()) {
            prop_assert!(SCRIPT_KEYS.contains(&key.as_str()));
        }

        #[test]
        fn engine_matches_model(scripts in script_sequence_strategy(12, 8)) {
            let engine = seeded_engine();
            let mut model = ReferenceModel::new(SEED_KEYS);

            for script in &scripts {
                let observed = model.run(&engine, script).unwrap();
                for (got, expected) in observed {
                    prop_assert_eq!(got, expected);
                }
            }

            for key in SCRIPT_KEYS {
                let got = engine.transaction(|tx| tx.read(key)).unwrap();
                prop_assert_eq!(got.as_ref(), model.get(key));
            }
            prop_assert_eq!(engine.active_count(), 0);
        }

        #[test]
        fn old_snapshot_is_stable(scripts in script_sequence_strategy(8, 6)) {
            let engine = seeded_engine();
            let mut model = ReferenceModel::new(SEED_KEYS);
            let mut reader = engine.begin();

            for script in &scripts {
                model.run(&engine, script).unwrap();
            }

            for key in SCRIPT_KEYS {
                let got = engine.read(&mut reader, key).unwrap();
                let expected = SEED_KEYS
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|&(_, v)| Bytes::from_static(v.as_bytes()));
                if expected.is_some() {
                    prop_assert_eq!(got, expected);
                }
            }
            engine.abort(&mut reader);
        }

        #[test]
        fn aborted_scripts_leave_chains_untouched(script in txn_script_strategy(10)) {
            let engine = seeded_engine();
            let before: Vec<_> = SEED_KEYS.iter().map(|(k, _)| engine.version_count(k)).collect();

            let mut aborting = script.clone();
            aborting.commit = false;
            ReferenceModel::new(SEED_KEYS).run(&engine, &aborting).unwrap();

            let after: Vec<_> = SEED_KEYS.iter().map(|(k, _)| engine.version_count(k)).collect();
            prop_assert_eq!(before, after);
            for (key, _) in SEED_KEYS {
                prop_assert_eq!(engine.lock_owner(key), None);
            }
        }
    }
}
