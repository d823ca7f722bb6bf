//! Record structures for DeckDB.
//!
//! A record is the materialized form of one stored row: a map from field
//! name to value. Records are schema-checked by the engines that produce
//! and consume them; the structure itself is untyped.

use crate::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Field name to value map. BTreeMap keeps iteration order deterministic.
pub type FieldMap = BTreeMap<String, Value>;

/// A materialized row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: FieldMap,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record from an existing field map.
    pub fn from_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a field value, treating a missing field as Null.
    pub fn get_or_null(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Check whether a field is present (even if Null).
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// The primary-key value, when present and a UUID.
    pub fn id(&self) -> Option<Uuid> {
        self.fields.get("id").and_then(Value::as_uuid)
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consume the record, yielding its field map.
    pub fn into_fields(self) -> FieldMap {
        self.fields
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
