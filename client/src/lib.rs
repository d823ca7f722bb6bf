//! DeckDB Client
//!
//! The typed façade over the engines: one `Client` per datasource, with a
//! per-entity delegate exposing the full operation family (find, create,
//! update, upsert, delete, count, aggregate, groupBy) plus transactions.
//!
//! Typed models mirror the deck schema; untyped row access (for select,
//! omit and include shaping) is available through the `_rows` variants.

mod client;
mod delegate;
mod model;
mod models;

pub use client::Client;
pub use delegate::Delegate;
pub use model::{Model, Role, ServerType, TimelineType};
pub use models::{Panel, ServerInfo, ServerSession, Timeline, User, UserInfo, UserSetting};

// Re-export the request/response vocabulary so client users need only
// this crate.
pub use deckdb_aggregate::{AggregateResult, AggregateSelect, GroupByArgs, GroupRow};
pub use deckdb_core::{Record, StoreError, StoreResult, Value};
pub use deckdb_filter::{FieldOp, Filter, RelationOp, StringMode};
pub use deckdb_mutation::{CreateInput, NestedWrite, UpdateInput};
pub use deckdb_query::{
    FindManyArgs, NullsOrder, OrderBy, Projection, QueryRow, Selection, SortOrder, UniqueKey,
};
pub use deckdb_transaction::{BatchOp, IsolationLevel, Transaction, TxnOptions};
