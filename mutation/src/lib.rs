//! DeckDB Mutation Engine
//!
//! Write operations: create, update, upsert, delete, and their plural
//! forms, with nested relation writes and referential delete policies.
//!
//! Responsibilities:
//! - Fill server-assigned defaults and validate payloads against the schema
//! - Resolve nested writes (create/connect/connectOrCreate and, on update,
//!   upsert/delete/disconnect) in foreign-key order
//! - Walk delete policies: cascade, restrict, set-null
//! - Keep every top-level operation atomic: on error the store is restored
//!   to its pre-operation state

mod cascade;
mod engine;
mod input;

pub use engine::MutationEngine;
pub use input::{CreateInput, NestedWrite, UpdateInput};
