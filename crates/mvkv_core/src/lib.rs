//! # mvkv Core
//!
//! Transaction engine for the mvkv in-memory key-value store.
//!
//! This crate provides:
//! - Multi-version key storage with snapshot reads
//! - Exclusive write locks with wait-for-graph deadlock detection
//! - Commit-time read set validation
//! - Engine statistics
//!
//! Every key keeps a chain of versions. Reads never block: a transaction
//! sees the newest version committed at or before its snapshot, or its own
//! buffered write. Writers lock keys exclusively, and commits publish all
//! buffered versions under a single new commit timestamp.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
pub mod lock;
mod stats;
pub mod store;
pub mod transaction;
mod types;

pub use config::EngineConfig;
pub use engine::{Engine, TransactionScope};
pub use error::{CoreError, CoreResult};
pub use stats::{EngineStats, StatsSnapshot};
pub use transaction::{Transaction, TransactionInfo, TransactionManager, TransactionState};
pub use types::{Timestamp, TransactionId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
