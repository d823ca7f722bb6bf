//! DeckDB Store
//!
//! In-memory row storage: one table per entity, rows keyed by UUID with
//! insertion-order scans, and unique single/compound indexes maintained on
//! every write. The store enforces unique keys; everything else (defaults,
//! relation policy, filter semantics) lives in the engines above it.
//!
//! The whole store is `Clone`; transactions snapshot it before a unit of
//! work and restore the snapshot on rollback.

mod store;
mod table;

pub use store::Store;
pub use table::{Table, UniqueIndex};
