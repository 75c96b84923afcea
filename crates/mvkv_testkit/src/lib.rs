//! # mvkv Testkit
//!
//! Test utilities for mvkv.
//!
//! This crate provides:
//! - Engine fixtures and tracing setup
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use mvkv_testkit::prelude::*;
//!
//! init_test_tracing();
//! let engine = seeded_engine();
//! let value = engine.transaction(|tx| tx.read("A")).unwrap();
//! assert_eq!(value.as_deref(), Some(&b"initialA"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
