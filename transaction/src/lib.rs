//! DeckDB Transaction Coordinator
//!
//! Interactive and batch transactions over the shared store. Writers are
//! serialized behind a single write lock; a transaction that cannot take
//! the lock within `max_wait` fails without running, and a body that
//! outlives `timeout` is rolled back wholesale.
//!
//! Rollback is snapshot-based: the store is cloned on entry and restored
//! on any error, so partial effects of a failed transaction are never
//! observable.

mod coordinator;
mod options;

pub use coordinator::{BatchOp, Transaction, TransactionCoordinator};
pub use options::{IsolationLevel, TxnOptions};
