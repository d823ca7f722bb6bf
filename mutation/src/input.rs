//! Mutation payloads.

use deckdb_core::{Record, Value};
use deckdb_query::UniqueKey;

/// Payload for `create` and the create arm of `upsert`: scalar fields plus
/// nested writes keyed by relation name.
#[derive(Debug, Clone, Default)]
pub struct CreateInput {
    pub fields: Record,
    pub nested: Vec<(String, NestedWrite)>,
}

impl CreateInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar field.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.set(name, value);
        self
    }

    /// Attach a nested write to a relation. Only `Create`, `Connect` and
    /// `ConnectOrCreate` are legal in a create payload.
    pub fn nested(mut self, relation: impl Into<String>, write: NestedWrite) -> Self {
        self.nested.push((relation.into(), write));
        self
    }
}

/// Payload for `update` and the update arm of `upsert`.
#[derive(Debug, Clone, Default)]
pub struct UpdateInput {
    pub fields: Record,
    pub nested: Vec<(String, NestedWrite)>,
}

impl UpdateInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar field.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.set(name, value);
        self
    }

    /// Attach a nested write to a relation.
    pub fn nested(mut self, relation: impl Into<String>, write: NestedWrite) -> Self {
        self.nested.push((relation.into(), write));
        self
    }
}

/// One nested write against a relation of the row being written.
///
/// The key-less `Delete`/`Disconnect` forms address the single row of a
/// to-one relation; to-many relations must name the row by unique key.
#[derive(Debug, Clone)]
pub enum NestedWrite {
    /// Create a related row, wired to this row's key.
    Create(CreateInput),
    /// Attach an existing row, found by unique key.
    Connect(UniqueKey),
    /// Attach the row holding the key, creating it first when absent.
    ConnectOrCreate { key: UniqueKey, create: CreateInput },
    /// Update the related row holding the key, creating it when absent
    /// (update only).
    Upsert {
        key: UniqueKey,
        update: UpdateInput,
        create: CreateInput,
    },
    /// Delete the related row, honoring delete policies (update only).
    Delete(Option<UniqueKey>),
    /// Clear the relation's (nullable) foreign key (update only).
    Disconnect(Option<UniqueKey>),
}

impl NestedWrite {
    /// Whether this write form is legal inside a create payload.
    pub fn allowed_in_create(&self) -> bool {
        matches!(
            self,
            NestedWrite::Create(_) | NestedWrite::Connect(_) | NestedWrite::ConnectOrCreate { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_forms() {
        assert!(NestedWrite::Create(CreateInput::new()).allowed_in_create());
        assert!(NestedWrite::Connect(vec![]).allowed_in_create());
        assert!(!NestedWrite::Delete(None).allowed_in_create());
        assert!(!NestedWrite::Disconnect(None).allowed_in_create());
    }
}
