//! Engine fixtures and test helpers.
//!
//! Provides convenience functions for setting up engines and common
//! test scenarios.

use mvkv_core::{Engine, EngineConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Keys and initial values used by the reference scenario.
pub const SEED_KEYS: [(&str, &str); 2] = [("A", "initialA"), ("B", "initialB")];

/// Configuration with a short lock retry interval, for fast tests.
#[must_use]
pub fn fast_config() -> EngineConfig {
    EngineConfig::new().lock_retry_interval(Duration::from_millis(1))
}

/// Creates an engine holding [`SEED_KEYS`].
pub fn seeded_engine() -> Engine {
    Engine::with_keys(fast_config(), SEED_KEYS).expect("seed keys are distinct")
}

/// Creates an engine with `count` keys named `key-0`, `key-1`, ..., each
/// holding `initial`.
pub fn engine_with_keys(count: usize, initial: &str) -> Engine {
    Engine::with_keys(
        fast_config(),
        key_names(count).into_iter().map(|k| (k, initial.to_owned())),
    )
    .expect("generated keys are distinct")
}

/// Returns `count` key names as created by [`engine_with_keys`].
#[must_use]
pub fn key_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{i}")).collect()
}

/// Runs a test with a freshly seeded engine.
///
/// # Example
///
/// ```rust
/// use mvkv_testkit::with_seeded_engine;
///
/// with_seeded_engine(|engine| {
///     let mut txn = engine.begin();
///     assert!(engine.read(&mut txn, "A").unwrap().is_some());
///     engine.abort(&mut txn);
/// });
/// ```
pub fn with_seeded_engine<F, R>(f: F) -> R
where
    F: FnOnce(&Engine) -> R,
{
    let engine = seeded_engine();
    f(&engine)
}

/// Installs a tracing subscriber for tests.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Safe to call from every test;
/// only the first call installs the subscriber.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
