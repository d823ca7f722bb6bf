//! DeckDB Query Executor
//!
//! Read operations over the store: unique-key point lookups, first-match
//! and list queries with ordering, cursor pagination, distinct, field
//! projection, and relation loading.
//!
//! Responsibilities:
//! - Validate arguments against the schema before touching rows
//! - Apply filter, order, distinct, and pagination in a fixed pipeline
//! - Load included relations in one pass per relation, not per row
//! - Shape results through select/omit projection

mod args;
mod executor;
mod result;

pub use args::{FindManyArgs, NullsOrder, OrderBy, Projection, Selection, SortOrder, UniqueKey};
pub use executor::QueryExecutor;
pub use result::QueryRow;
