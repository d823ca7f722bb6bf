//! DeckDB Core Types
//!
//! This crate provides the foundational types used throughout the DeckDB system:
//! - Value types (the Value enum with all scalar types stored in records)
//! - Record structures (the materialized row representation)
//! - Common error types (the operation error taxonomy)

mod error;
mod record;
mod value;

pub use error::*;
pub use record::*;
pub use value::*;
