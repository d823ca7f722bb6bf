//! DeckDB Schema Registry
//!
//! Static description of entities, fields, relations and unique keys.
//! The registry is explicit runtime data: filter trees, payloads and
//! projections are validated against it at call time instead of being
//! encoded in the type system.
//!
//! `deck_schema()` builds the fixed seven-entity schema of the social-deck
//! application; the builder and lookup machinery are schema-agnostic.

mod builder;
mod deck;
mod registry;
mod types;

pub use builder::{EntityBuilder, SchemaBuilder, SchemaError, SchemaResult};
pub use deck::deck_schema;
pub use registry::SchemaRegistry;
pub use types::*;
