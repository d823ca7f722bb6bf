//! The in-memory store: one table per entity.

use crate::Table;
use deckdb_core::{StoreError, StoreResult};
use deckdb_schema::SchemaRegistry;
use std::collections::HashMap;

/// The whole database: tables for every entity in the registry.
///
/// Cloning produces an independent snapshot; the transaction coordinator
/// relies on this for rollback.
#[derive(Debug, Clone)]
pub struct Store {
    tables: HashMap<String, Table>,
}

impl Store {
    /// Create an empty store with one table per registry entity.
    pub fn new(registry: &SchemaRegistry) -> Self {
        let tables = registry
            .entities()
            .map(|entity| (entity.name.clone(), Table::new(entity)))
            .collect();
        Self { tables }
    }

    /// Get a table by entity name.
    pub fn table(&self, entity: &str) -> StoreResult<&Table> {
        self.tables
            .get(entity)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", entity)))
    }

    /// Get a mutable table by entity name.
    pub fn table_mut(&mut self, entity: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(entity)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", entity)))
    }

    /// Total row count across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckdb_core::Record;
    use deckdb_schema::deck_schema;
    use uuid::Uuid;

    #[test]
    fn test_store_has_a_table_per_entity() {
        // GIVEN
        let registry = deck_schema().unwrap();

        // WHEN
        let store = Store::new(&registry);

        // THEN
        for entity in registry.entities() {
            assert!(store.table(&entity.name).is_ok());
        }
        assert!(store.table("Nonexistent").is_err());
    }

    #[test]
    fn test_clone_is_an_independent_snapshot() {
        // GIVEN
        let registry = deck_schema().unwrap();
        let mut store = Store::new(&registry);
        let snapshot = store.clone();

        // WHEN
        let mut row = Record::new();
        row.set("id", Uuid::new_v4());
        row.set("email", "a@x.com");
        store.table_mut("User").unwrap().insert(row).unwrap();

        // THEN
        assert_eq!(store.row_count(), 1);
        assert_eq!(snapshot.row_count(), 0);
    }
}
