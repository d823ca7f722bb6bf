//! The SchemaRegistry - immutable schema lookup.

use crate::{EntityDef, FieldDef, RelationDef};
use regex_lite::Regex;
use std::collections::HashMap;

/// The SchemaRegistry provides runtime lookup of entity definitions.
/// It is immutable after construction.
#[derive(Debug)]
pub struct SchemaRegistry {
    /// Entity definitions by name.
    entities: HashMap<String, EntityDef>,
    /// Entity names in declaration order.
    entity_order: Vec<String>,
    /// Compiled format constraints by name.
    formats: HashMap<&'static str, Regex>,
}

impl SchemaRegistry {
    /// Create a registry (use SchemaBuilder for construction).
    pub(crate) fn new(
        entities: HashMap<String, EntityDef>,
        entity_order: Vec<String>,
        formats: HashMap<&'static str, Regex>,
    ) -> Self {
        Self {
            entities,
            entity_order,
            formats,
        }
    }

    /// Get an entity definition by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get a field definition by entity and field name.
    pub fn field(&self, entity: &str, field: &str) -> Option<&FieldDef> {
        self.entities.get(entity).and_then(|e| e.field(field))
    }

    /// Get a relation definition by entity and relation name.
    pub fn relation(&self, entity: &str, relation: &str) -> Option<&RelationDef> {
        self.entities.get(entity).and_then(|e| e.relation(relation))
    }

    /// Iterate entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entity_order
            .iter()
            .filter_map(|name| self.entities.get(name))
    }

    /// Number of entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Check a string value against a field's named format constraint.
    /// Fields without a format always pass.
    pub fn format_matches(&self, field: &FieldDef, value: &str) -> bool {
        match &field.format {
            Some(name) => self
                .formats
                .get(name.as_str())
                .map(|re| re.is_match(value))
                .unwrap_or(true),
            None => true,
        }
    }
}
