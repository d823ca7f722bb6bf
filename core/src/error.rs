//! The operation error taxonomy.
//!
//! Every engine reports failures through `StoreError` so callers can match
//! on a stable discriminator: NotFound, UniqueViolation, Validation,
//! Restrict, or a transaction bound being exceeded. Plural operations
//! (`...Many`) never raise NotFound; they report affected counts instead.

use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by query, mutation, aggregation and transaction operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched a singular targeting key (`findUniqueOrThrow`,
    /// `findFirstOrThrow`, `update`, `delete`).
    #[error("Record not found: {entity}")]
    NotFound { entity: String },

    /// A write would violate a single or compound unique key.
    #[error("Unique constraint violation on {entity} ({})", .fields.join(", "))]
    UniqueViolation { entity: String, fields: Vec<String> },

    /// Malformed request shape: unknown field/relation in a filter,
    /// ill-typed operand, invalid groupBy arguments, bad payload.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Deleting a parent row blocked by dependents under a non-cascade relation.
    #[error("Delete on {entity} restricted by dependent {relation} rows")]
    Restrict { entity: String, relation: String },

    /// The transaction lock was not acquired within `maxWait`.
    #[error("Transaction not started within {0:?}")]
    TxnMaxWait(Duration),

    /// The transaction body exceeded its `timeout`; all writes were rolled back.
    #[error("Transaction timed out after {0:?}")]
    TxnTimeout(Duration),

    /// Operation issued on a disconnected client.
    #[error("Client is disconnected")]
    Disconnected,
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn unique_violation(entity: impl Into<String>, fields: Vec<String>) -> Self {
        Self::UniqueViolation {
            entity: entity.into(),
            fields,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn restrict(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::Restrict {
            entity: entity.into(),
            relation: relation.into(),
        }
    }

    /// Whether this error is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Whether this error is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
