//! Schema definition types.

use std::collections::HashMap;

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// UTC timestamp.
    DateTime,
    /// UUID identifier (primary or foreign key).
    Uuid,
    /// Enumeration; values are stored as strings drawn from this set.
    Enum(Vec<String>),
}

impl FieldKind {
    /// Enum variants, if this is an enum kind.
    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            FieldKind::Enum(values) => Some(values),
            _ => None,
        }
    }
}

/// Server-assigned default applied when a create payload omits the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Fresh UUID v4.
    UuidV4,
    /// Current UTC time.
    Now,
}

/// Field definition within an entity.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Semantic type.
    pub kind: FieldKind,
    /// Whether this field may hold null.
    pub nullable: bool,
    /// Whether this field must be unique across rows (single-field key).
    pub unique: bool,
    /// Default value applied on create.
    pub default: Option<FieldDefault>,
    /// Named format constraint ("email", "url"), checked on write.
    pub format: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            unique: false,
            default: None,
            format: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Cardinality and ownership of a relation, seen from the entity that
/// declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// One-to-many: the target entity holds the foreign key.
    HasMany,
    /// One-to-one: the target entity holds a unique foreign key.
    HasOne,
    /// Many-to-one or the inverse side of a one-to-one: this entity holds
    /// the foreign key.
    BelongsTo,
}

/// Action applied to dependent rows when the parent row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDeleteAction {
    /// Block the delete while dependents exist (default).
    #[default]
    Restrict,
    /// Delete dependents in the same unit of work.
    Cascade,
    /// Clear the (nullable) foreign key on dependents.
    SetNull,
}

/// Relation definition within an entity.
#[derive(Debug, Clone)]
pub struct RelationDef {
    /// Relation name (used in filters and include trees).
    pub name: String,
    /// Target entity name.
    pub target: String,
    /// Cardinality/ownership.
    pub kind: RelationKind,
    /// Foreign-key field: lives on the target for HasMany/HasOne, on the
    /// declaring entity for BelongsTo.
    pub fk_field: String,
    /// Delete policy for HasMany/HasOne dependents. Ignored for BelongsTo.
    pub on_delete: OnDeleteAction,
}

impl RelationDef {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        kind: RelationKind,
        fk_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            fk_field: fk_field.into(),
            on_delete: OnDeleteAction::default(),
        }
    }

    pub fn on_delete(mut self, action: OnDeleteAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Whether this relation points at a single row.
    pub fn is_to_one(&self) -> bool {
        matches!(self.kind, RelationKind::HasOne | RelationKind::BelongsTo)
    }
}

/// Entity definition.
#[derive(Debug, Clone)]
pub struct EntityDef {
    /// Entity name.
    pub name: String,
    /// Field definitions by name.
    pub fields: HashMap<String, FieldDef>,
    /// Field names in declaration order.
    pub field_order: Vec<String>,
    /// Relation definitions by name.
    pub relations: HashMap<String, RelationDef>,
    /// Compound unique key sets (each spanning more than one field).
    pub compound_uniques: Vec<Vec<String>>,
}

impl EntityDef {
    /// Get a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Check if this entity has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Get a relation definition by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    /// Iterate fields in declaration order.
    pub fn fields_in_order(&self) -> impl Iterator<Item = &FieldDef> {
        self.field_order.iter().filter_map(|name| self.fields.get(name))
    }

    /// All unique key sets: the primary key, each single-field unique,
    /// then the compound sets.
    pub fn unique_sets(&self) -> Vec<Vec<String>> {
        let mut sets = Vec::new();
        for name in &self.field_order {
            if let Some(field) = self.fields.get(name) {
                if field.unique {
                    sets.push(vec![field.name.clone()]);
                }
            }
        }
        sets.extend(self.compound_uniques.iter().cloned());
        sets
    }

    /// Whether the given field set is one of this entity's unique keys.
    pub fn is_unique_key(&self, fields: &[String]) -> bool {
        let mut wanted: Vec<&str> = fields.iter().map(String::as_str).collect();
        wanted.sort_unstable();
        self.unique_sets().iter().any(|set| {
            let mut set: Vec<&str> = set.iter().map(String::as_str).collect();
            set.sort_unstable();
            set == wanted
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_with_uniques() -> EntityDef {
        let mut fields = HashMap::new();
        let mut field_order = Vec::new();
        for field in [
            FieldDef::new("id", FieldKind::Uuid).unique(),
            FieldDef::new("origin", FieldKind::String),
            FieldDef::new("user_id", FieldKind::Uuid),
        ] {
            field_order.push(field.name.clone());
            fields.insert(field.name.clone(), field);
        }
        EntityDef {
            name: "ServerSession".to_string(),
            fields,
            field_order,
            relations: HashMap::new(),
            compound_uniques: vec![vec!["origin".to_string(), "user_id".to_string()]],
        }
    }

    #[test]
    fn test_unique_sets_include_compound() {
        // GIVEN
        let entity = entity_with_uniques();

        // WHEN
        let sets = entity.unique_sets();

        // THEN
        assert!(sets.contains(&vec!["id".to_string()]));
        assert!(sets.contains(&vec!["origin".to_string(), "user_id".to_string()]));
    }

    #[test]
    fn test_is_unique_key_ignores_field_order() {
        let entity = entity_with_uniques();
        assert!(entity.is_unique_key(&["user_id".to_string(), "origin".to_string()]));
        assert!(!entity.is_unique_key(&["origin".to_string()]));
    }
}
