//! Per-entity row storage with maintained unique indexes.

use deckdb_core::{Record, StoreError, StoreResult, Value};
use deckdb_schema::EntityDef;
use std::collections::HashMap;
use uuid::Uuid;

/// A unique index over one or more fields.
///
/// Following SQL semantics, rows with a null component are not indexed and
/// never conflict with each other.
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    /// Indexed fields, in key order.
    fields: Vec<String>,
    /// Key values to owning row.
    map: HashMap<Vec<Value>, Uuid>,
}

impl UniqueIndex {
    fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            map: HashMap::new(),
        }
    }

    /// The indexed field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Extract this index's key from a record. None if any component is null
    /// or missing (such rows are not indexed).
    fn key_of(&self, record: &Record) -> Option<Vec<Value>> {
        let mut key = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match record.get(field) {
                Some(value) if !value.is_null() => key.push(value.clone()),
                _ => return None,
            }
        }
        Some(key)
    }

    /// Row currently holding the given key, if any.
    fn holder(&self, key: &[Value]) -> Option<Uuid> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, record: &Record, id: Uuid) {
        if let Some(key) = self.key_of(record) {
            self.map.insert(key, id);
        }
    }

    fn remove(&mut self, record: &Record) {
        if let Some(key) = self.key_of(record) {
            self.map.remove(&key);
        }
    }

    /// Look up a row by key values paired with field names. The pairing may
    /// be in any order; returns None if the fields do not match this index.
    fn lookup(&self, pairs: &[(String, Value)]) -> Option<Option<Uuid>> {
        if pairs.len() != self.fields.len() {
            return None;
        }
        let mut key = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = pairs.iter().find(|(name, _)| name == field)?;
            key.push(value.1.clone());
        }
        Some(self.holder(&key))
    }
}

/// Row storage for one entity.
#[derive(Debug, Clone)]
pub struct Table {
    /// Entity name (for error reporting).
    entity: String,
    /// Row storage.
    rows: HashMap<Uuid, Record>,
    /// Insertion order for stable scans.
    order: Vec<Uuid>,
    /// Unique indexes (single-field uniques and compound sets; the primary
    /// key is covered by `rows` itself).
    uniques: Vec<UniqueIndex>,
}

impl Table {
    /// Create an empty table with indexes derived from the entity definition.
    pub fn new(entity: &EntityDef) -> Self {
        let uniques = entity
            .unique_sets()
            .into_iter()
            .filter(|set| set.as_slice() != ["id".to_string()])
            .map(UniqueIndex::new)
            .collect();

        Self {
            entity: entity.name.clone(),
            rows: HashMap::new(),
            order: Vec::new(),
            uniques,
        }
    }

    /// Entity name this table stores.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Get a row by primary key.
    pub fn get(&self, id: Uuid) -> Option<&Record> {
        self.rows.get(&id)
    }

    /// Iterate rows in insertion order.
    pub fn scan(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The unique key fields that `record` would collide on, excluding the
    /// row `exclude` (for updates). None when the record is insertable.
    pub fn conflict_of(&self, record: &Record, exclude: Option<Uuid>) -> Option<Vec<String>> {
        if let Some(id) = record.id() {
            if exclude != Some(id) && self.rows.contains_key(&id) {
                return Some(vec!["id".to_string()]);
            }
        }
        for index in &self.uniques {
            if let Some(key) = index.key_of(record) {
                match index.holder(&key) {
                    Some(holder) if Some(holder) != exclude => {
                        return Some(index.fields.to_vec());
                    }
                    _ => {}
                }
            }
        }
        None
    }

    /// Insert a full record. The record must carry a non-null `id`.
    pub fn insert(&mut self, record: Record) -> StoreResult<Uuid> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::validation(format!("{} row has no id", self.entity)))?;

        if let Some(fields) = self.conflict_of(&record, None) {
            return Err(StoreError::unique_violation(&self.entity, fields));
        }

        for index in &mut self.uniques {
            index.insert(&record, id);
        }
        self.rows.insert(id, record);
        self.order.push(id);
        Ok(id)
    }

    /// Replace the row `id` with `record` (same id), re-checking and
    /// re-maintaining unique indexes.
    pub fn update(&mut self, id: Uuid, record: Record) -> StoreResult<()> {
        let old = self
            .rows
            .get(&id)
            .ok_or_else(|| StoreError::not_found(&self.entity))?
            .clone();

        if let Some(fields) = self.conflict_of(&record, Some(id)) {
            return Err(StoreError::unique_violation(&self.entity, fields));
        }

        for index in &mut self.uniques {
            index.remove(&old);
            index.insert(&record, id);
        }
        self.rows.insert(id, record);
        Ok(())
    }

    /// Remove a row, returning it.
    pub fn remove(&mut self, id: Uuid) -> Option<Record> {
        let record = self.rows.remove(&id)?;
        for index in &mut self.uniques {
            index.remove(&record);
        }
        self.order.retain(|other| *other != id);
        Some(record)
    }

    /// Look up a row by a unique key given as (field, value) pairs.
    /// `id` lookups hit the primary map; other keys hit their index.
    /// Returns None when no row holds the key.
    pub fn find_by_unique(&self, pairs: &[(String, Value)]) -> Option<&Record> {
        if let [(name, value)] = pairs {
            if name == "id" {
                return value.as_uuid().and_then(|id| self.rows.get(&id));
            }
        }
        for index in &self.uniques {
            if let Some(holder) = index.lookup(pairs) {
                return holder.and_then(|id| self.rows.get(&id));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckdb_schema::{FieldDef, FieldKind, SchemaBuilder, SchemaRegistry};

    fn session_registry() -> SchemaRegistry {
        let mut builder = SchemaBuilder::new();
        builder
            .entity("ServerSession")
            .field(FieldDef::new("id", FieldKind::Uuid).unique())
            .field(FieldDef::new("origin", FieldKind::String))
            .field(FieldDef::new("user_id", FieldKind::Uuid))
            .field(FieldDef::new("note", FieldKind::String).nullable())
            .unique(&["origin", "user_id"])
            .done()
            .unwrap();
        builder.build().unwrap()
    }

    fn session_row(origin: &str, user_id: Uuid) -> Record {
        let mut record = Record::new();
        record.set("id", Uuid::new_v4());
        record.set("origin", origin);
        record.set("user_id", user_id);
        record.set("note", Value::Null);
        record
    }

    #[test]
    fn test_insert_and_scan_order() {
        // GIVEN
        let registry = session_registry();
        let mut table = Table::new(registry.entity("ServerSession").unwrap());
        let user = Uuid::new_v4();

        // WHEN
        table.insert(session_row("https://a.example", user)).unwrap();
        table.insert(session_row("https://b.example", user)).unwrap();

        // THEN
        let origins: Vec<_> = table
            .scan()
            .map(|r| r.get("origin").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_compound_unique_conflict() {
        // GIVEN
        let registry = session_registry();
        let mut table = Table::new(registry.entity("ServerSession").unwrap());
        let user = Uuid::new_v4();
        table.insert(session_row("https://a.example", user)).unwrap();

        // WHEN: same (origin, user_id) pair
        let result = table.insert(session_row("https://a.example", user));

        // THEN
        match result {
            Err(StoreError::UniqueViolation { entity, fields }) => {
                assert_eq!(entity, "ServerSession");
                assert_eq!(fields, vec!["origin".to_string(), "user_id".to_string()]);
            }
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[test]
    fn test_update_moves_index_entries() {
        // GIVEN
        let registry = session_registry();
        let mut table = Table::new(registry.entity("ServerSession").unwrap());
        let user = Uuid::new_v4();
        let id = table.insert(session_row("https://a.example", user)).unwrap();

        // WHEN: move the row to a new origin
        let mut updated = table.get(id).unwrap().clone();
        updated.set("origin", "https://b.example");
        table.update(id, updated).unwrap();

        // THEN: the old key is free again, the new key is taken
        table.insert(session_row("https://a.example", user)).unwrap();
        assert!(table
            .insert(session_row("https://b.example", user))
            .is_err());
    }

    #[test]
    fn test_update_to_same_key_is_not_a_conflict() {
        let registry = session_registry();
        let mut table = Table::new(registry.entity("ServerSession").unwrap());
        let id = table
            .insert(session_row("https://a.example", Uuid::new_v4()))
            .unwrap();

        let mut updated = table.get(id).unwrap().clone();
        updated.set("note", "still me");
        assert!(table.update(id, updated).is_ok());
    }

    #[test]
    fn test_remove_frees_unique_key() {
        let registry = session_registry();
        let mut table = Table::new(registry.entity("ServerSession").unwrap());
        let user = Uuid::new_v4();
        let id = table.insert(session_row("https://a.example", user)).unwrap();

        assert!(table.remove(id).is_some());
        assert!(table.insert(session_row("https://a.example", user)).is_ok());
        assert!(table.remove(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_find_by_unique() {
        let registry = session_registry();
        let mut table = Table::new(registry.entity("ServerSession").unwrap());
        let user = Uuid::new_v4();
        let id = table.insert(session_row("https://a.example", user)).unwrap();

        // Primary key lookup
        let by_id = table.find_by_unique(&[("id".to_string(), Value::Uuid(id))]);
        assert_eq!(by_id.and_then(Record::id), Some(id));

        // Compound key lookup, field order independent
        let by_pair = table.find_by_unique(&[
            ("user_id".to_string(), Value::Uuid(user)),
            ("origin".to_string(), Value::from("https://a.example")),
        ]);
        assert_eq!(by_pair.and_then(Record::id), Some(id));

        let missing = table.find_by_unique(&[
            ("origin".to_string(), Value::from("https://z.example")),
            ("user_id".to_string(), Value::Uuid(user)),
        ]);
        assert!(missing.is_none());
    }
}
