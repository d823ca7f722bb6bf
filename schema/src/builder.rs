//! SchemaBuilder for constructing an immutable SchemaRegistry.

use crate::{EntityDef, FieldDef, OnDeleteAction, RelationDef, RelationKind, SchemaRegistry};
use regex_lite::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during schema construction. These are programmer
/// errors and surface once, at startup, never per-request.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Duplicate entity name: {0}")]
    DuplicateEntity(String),

    #[error("Duplicate field {field} on entity {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("Duplicate relation {relation} on entity {entity}")]
    DuplicateRelation { entity: String, relation: String },

    #[error("Relation {relation} on {entity} targets unknown entity {target}")]
    UnknownRelationTarget {
        entity: String,
        relation: String,
        target: String,
    },

    #[error("Relation {relation} on {entity} references unknown field {field} on {holder}")]
    UnknownForeignKey {
        entity: String,
        relation: String,
        holder: String,
        field: String,
    },

    #[error("HasOne relation {relation} on {entity} requires a unique foreign key {field}")]
    NonUniqueHasOne {
        entity: String,
        relation: String,
        field: String,
    },

    #[error("SetNull relation {relation} on {entity} requires a nullable foreign key {field}")]
    SetNullOnRequiredKey {
        entity: String,
        relation: String,
        field: String,
    },

    #[error("Compound unique on {entity} references unknown field {field}")]
    UnknownUniqueField { entity: String, field: String },

    #[error("Unknown format constraint {format} on {entity}.{field}")]
    UnknownFormat {
        entity: String,
        field: String,
        format: String,
    },

    #[error("Entity {0} has no id field")]
    MissingId(String),
}

/// Result type for schema construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Builder for constructing an immutable SchemaRegistry.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityDef>,
}

impl SchemaBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start defining an entity.
    pub fn entity(&mut self, name: impl Into<String>) -> EntityBuilder<'_> {
        EntityBuilder {
            builder: self,
            name: name.into(),
            fields: Vec::new(),
            relations: Vec::new(),
            compound_uniques: Vec::new(),
        }
    }

    /// Validate all definitions and build the registry.
    pub fn build(self) -> SchemaResult<SchemaRegistry> {
        let mut entities: HashMap<String, EntityDef> = HashMap::new();
        let mut order = Vec::new();

        for entity in self.entities {
            if entities.contains_key(&entity.name) {
                return Err(SchemaError::DuplicateEntity(entity.name));
            }
            order.push(entity.name.clone());
            entities.insert(entity.name.clone(), entity);
        }

        let formats = compile_formats();

        // Cross-entity validation: every id, relation target and foreign key
        // must resolve before any request is served.
        for entity in entities.values() {
            if !entity.has_field("id") {
                return Err(SchemaError::MissingId(entity.name.clone()));
            }

            for field in entity.fields.values() {
                if let Some(format) = &field.format {
                    if !formats.contains_key(format.as_str()) {
                        return Err(SchemaError::UnknownFormat {
                            entity: entity.name.clone(),
                            field: field.name.clone(),
                            format: format.clone(),
                        });
                    }
                }
            }

            for set in &entity.compound_uniques {
                for field in set {
                    if !entity.has_field(field) {
                        return Err(SchemaError::UnknownUniqueField {
                            entity: entity.name.clone(),
                            field: field.clone(),
                        });
                    }
                }
            }

            for relation in entity.relations.values() {
                let target = entities.get(&relation.target).ok_or_else(|| {
                    SchemaError::UnknownRelationTarget {
                        entity: entity.name.clone(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                    }
                })?;

                // The FK lives on the target for HasMany/HasOne, on the
                // declaring entity for BelongsTo.
                let holder = match relation.kind {
                    RelationKind::HasMany | RelationKind::HasOne => target,
                    RelationKind::BelongsTo => entity,
                };
                let fk = holder.field(&relation.fk_field).ok_or_else(|| {
                    SchemaError::UnknownForeignKey {
                        entity: entity.name.clone(),
                        relation: relation.name.clone(),
                        holder: holder.name.clone(),
                        field: relation.fk_field.clone(),
                    }
                })?;

                if relation.kind == RelationKind::HasOne && !fk.unique {
                    return Err(SchemaError::NonUniqueHasOne {
                        entity: entity.name.clone(),
                        relation: relation.name.clone(),
                        field: relation.fk_field.clone(),
                    });
                }

                if relation.on_delete == OnDeleteAction::SetNull && !fk.nullable {
                    return Err(SchemaError::SetNullOnRequiredKey {
                        entity: entity.name.clone(),
                        relation: relation.name.clone(),
                        field: relation.fk_field.clone(),
                    });
                }
            }
        }

        Ok(SchemaRegistry::new(entities, order, formats))
    }

    fn finish_entity(&mut self, entity: EntityDef) {
        self.entities.push(entity);
    }
}

/// Builder for a single entity definition.
pub struct EntityBuilder<'b> {
    builder: &'b mut SchemaBuilder,
    name: String,
    fields: Vec<FieldDef>,
    relations: Vec<RelationDef>,
    compound_uniques: Vec<Vec<String>>,
}

impl<'b> EntityBuilder<'b> {
    /// Add a field definition.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a relation definition.
    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Add a compound unique key spanning the given fields.
    pub fn unique(mut self, fields: &[&str]) -> Self {
        self.compound_uniques
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Finish the entity, checking for duplicate field/relation names.
    pub fn done(self) -> SchemaResult<()> {
        let mut fields = HashMap::new();
        let mut field_order = Vec::new();
        for field in self.fields {
            if fields.contains_key(&field.name) {
                return Err(SchemaError::DuplicateField {
                    entity: self.name,
                    field: field.name,
                });
            }
            field_order.push(field.name.clone());
            fields.insert(field.name.clone(), field);
        }

        let mut relations = HashMap::new();
        for relation in self.relations {
            if relations.contains_key(&relation.name) {
                return Err(SchemaError::DuplicateRelation {
                    entity: self.name,
                    relation: relation.name,
                });
            }
            relations.insert(relation.name.clone(), relation);
        }

        self.builder.finish_entity(EntityDef {
            name: self.name,
            fields,
            field_order,
            relations,
            compound_uniques: self.compound_uniques,
        });
        Ok(())
    }
}

/// Compile the named format constraints available to field definitions.
fn compile_formats() -> HashMap<&'static str, Regex> {
    let mut formats = HashMap::new();
    formats.insert(
        "email",
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email format regex"),
    );
    formats.insert(
        "url",
        Regex::new(r"^https?://[^\s]+$").expect("url format regex"),
    );
    formats
}
