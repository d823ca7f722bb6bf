//! DeckDB Aggregation Engine
//!
//! Row counting, min/max/count aggregates over filtered rows, and grouped
//! aggregation with having, ordering, and pagination over groups.
//!
//! Argument validation is complete before any row is visited: malformed
//! groupBy arguments (empty key, having or orderBy outside the key,
//! pagination without an ordering) fail identically on empty and populated
//! stores.

mod args;
mod engine;

pub use args::{AggregateResult, AggregateSelect, GroupByArgs, GroupRow};
pub use engine::AggregateEngine;
