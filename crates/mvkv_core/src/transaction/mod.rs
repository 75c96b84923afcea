//! Transaction management.
//!
//! mvkv transactions provide:
//! - **Atomicity**: all buffered writes publish at one commit timestamp, or none do
//! - **Isolation**: snapshot reads plus read set validation at commit
//! - **Write exclusion**: one writer per key, with deadlock detection

mod manager;
mod state;
mod validator;

pub(crate) use manager::EngineState;
pub use manager::TransactionManager;
pub use state::{Transaction, TransactionInfo, TransactionState};
