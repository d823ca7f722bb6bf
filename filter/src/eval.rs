//! Filter evaluation.
//!
//! The evaluator is pure: it reads the registry and the store but never
//! mutates either. Internally each node evaluates to `Option<bool>`,
//! Kleene three-valued logic with `None` as SQL's unknown. A row matches
//! only when the root evaluates to `Some(true)`.

use crate::{FieldOp, Filter, RelationOp, StringMode};
use deckdb_core::{Record, StoreError, StoreResult, Value};
use deckdb_schema::{EntityDef, FieldDef, FieldKind, RelationDef, SchemaRegistry};
use deckdb_store::Store;

/// Filter evaluator over one store.
pub struct FilterEvaluator<'a> {
    registry: &'a SchemaRegistry,
    store: &'a Store,
}

impl<'a> FilterEvaluator<'a> {
    /// Create a new evaluator.
    pub fn new(registry: &'a SchemaRegistry, store: &'a Store) -> Self {
        Self { registry, store }
    }

    /// Validate a filter tree against the schema without touching any rows.
    /// Executors call this once per request so malformed filters fail even
    /// when no row would be visited.
    pub fn validate(&self, entity: &str, filter: &Filter) -> StoreResult<()> {
        let entity = self.entity(entity)?;
        self.validate_node(entity, filter)
    }

    /// Whether a record matches the filter.
    pub fn matches(&self, entity: &str, record: &Record, filter: &Filter) -> StoreResult<bool> {
        let entity = self.entity(entity)?;
        Ok(self.eval(entity, record, filter)? == Some(true))
    }

    fn entity(&self, name: &str) -> StoreResult<&'a EntityDef> {
        self.registry
            .entity(name)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", name)))
    }

    // ==================== Validation ====================

    fn validate_node(&self, entity: &EntityDef, filter: &Filter) -> StoreResult<()> {
        match filter {
            Filter::And(items) | Filter::Or(items) => {
                for item in items {
                    self.validate_node(entity, item)?;
                }
                Ok(())
            }
            Filter::Not(inner) => self.validate_node(entity, inner),
            Filter::Field { field, op } => {
                let field_def = entity.field(field).ok_or_else(|| {
                    StoreError::validation(format!("unknown field {}.{}", entity.name, field))
                })?;
                self.validate_field_op(entity, field_def, op)
            }
            Filter::Relation { relation, op } => {
                let relation_def = entity.relation(relation).ok_or_else(|| {
                    StoreError::validation(format!(
                        "unknown relation {}.{}",
                        entity.name, relation
                    ))
                })?;
                self.validate_relation_op(entity, relation_def, op)
            }
        }
    }

    fn validate_field_op(
        &self,
        entity: &EntityDef,
        field: &FieldDef,
        op: &FieldOp,
    ) -> StoreResult<()> {
        match op {
            FieldOp::Equals(value)
            | FieldOp::Lt(value)
            | FieldOp::Lte(value)
            | FieldOp::Gt(value)
            | FieldOp::Gte(value) => self.check_operand(entity, field, value),
            FieldOp::In(values) | FieldOp::NotIn(values) => {
                for value in values {
                    self.check_operand(entity, field, value)?;
                }
                Ok(())
            }
            FieldOp::Contains(_, _) | FieldOp::StartsWith(_, _) | FieldOp::EndsWith(_, _) => {
                if field.kind == FieldKind::String {
                    Ok(())
                } else {
                    Err(StoreError::validation(format!(
                        "string comparison on non-string field {}.{}",
                        entity.name, field.name
                    )))
                }
            }
            FieldOp::IsNull(_) => Ok(()),
        }
    }

    /// A comparison operand must be non-null and of the field's type.
    fn check_operand(
        &self,
        entity: &EntityDef,
        field: &FieldDef,
        value: &Value,
    ) -> StoreResult<()> {
        if value.is_null() {
            return Err(StoreError::validation(format!(
                "null comparison on {}.{} must use the null test",
                entity.name, field.name
            )));
        }
        let compatible = match &field.kind {
            FieldKind::String => matches!(value, Value::String(_)),
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            FieldKind::DateTime => matches!(value, Value::DateTime(_)),
            FieldKind::Uuid => matches!(value, Value::Uuid(_)),
            FieldKind::Enum(members) => match value {
                Value::String(s) => members.iter().any(|m| m == s),
                _ => false,
            },
        };
        if compatible {
            Ok(())
        } else {
            Err(StoreError::validation(format!(
                "operand {} is not valid for field {}.{}",
                value, entity.name, field.name
            )))
        }
    }

    fn validate_relation_op(
        &self,
        entity: &EntityDef,
        relation: &RelationDef,
        op: &RelationOp,
    ) -> StoreResult<()> {
        let target = self.entity(&relation.target)?;
        match op {
            RelationOp::Some(inner) | RelationOp::Every(inner) | RelationOp::None(inner) => {
                if relation.is_to_one() {
                    return Err(StoreError::validation(format!(
                        "quantifier on to-one relation {}.{}",
                        entity.name, relation.name
                    )));
                }
                self.validate_node(target, inner)
            }
            RelationOp::Is(inner) | RelationOp::IsNot(inner) => {
                if !relation.is_to_one() {
                    return Err(StoreError::validation(format!(
                        "is/isNot on to-many relation {}.{}",
                        entity.name, relation.name
                    )));
                }
                match inner {
                    Some(inner) => self.validate_node(target, inner),
                    None => Ok(()),
                }
            }
        }
    }

    // ==================== Evaluation ====================

    fn eval(&self, entity: &EntityDef, record: &Record, filter: &Filter) -> StoreResult<Option<bool>> {
        match filter {
            Filter::And(items) => {
                // SQL AND: false dominates, then unknown, then true.
                let mut result = Some(true);
                for item in items {
                    match self.eval(entity, record, item)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            Filter::Or(items) => {
                // SQL OR: true dominates, then unknown, then false.
                let mut result = Some(false);
                for item in items {
                    match self.eval(entity, record, item)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            Filter::Not(inner) => Ok(self.eval(entity, record, inner)?.map(|b| !b)),
            Filter::Field { field, op } => {
                let field_def = entity.field(field).ok_or_else(|| {
                    StoreError::validation(format!("unknown field {}.{}", entity.name, field))
                })?;
                Ok(eval_field_op(&record.get_or_null(&field_def.name), op))
            }
            Filter::Relation { relation, op } => {
                let relation_def = entity.relation(relation).ok_or_else(|| {
                    StoreError::validation(format!(
                        "unknown relation {}.{}",
                        entity.name, relation
                    ))
                })?;
                self.eval_relation(entity, record, relation_def, op)
            }
        }
    }

    fn eval_relation(
        &self,
        entity: &EntityDef,
        record: &Record,
        relation: &RelationDef,
        op: &RelationOp,
    ) -> StoreResult<Option<bool>> {
        let target = self.entity(&relation.target)?;
        match op {
            // Quantifiers over the related collection. EXISTS-style: an
            // unknown inner result does not count as a match.
            RelationOp::Some(inner) => {
                for child in self.children(entity, record, relation)? {
                    if self.eval(target, child, inner)? == Some(true) {
                        return Ok(Some(true));
                    }
                }
                Ok(Some(false))
            }
            RelationOp::Every(inner) => {
                for child in self.children(entity, record, relation)? {
                    if self.eval(target, child, inner)? != Some(true) {
                        return Ok(Some(false));
                    }
                }
                Ok(Some(true))
            }
            RelationOp::None(inner) => {
                for child in self.children(entity, record, relation)? {
                    if self.eval(target, child, inner)? == Some(true) {
                        return Ok(Some(false));
                    }
                }
                Ok(Some(true))
            }
            RelationOp::Is(inner) => {
                let related = self.to_one(entity, record, relation)?;
                match (related, inner) {
                    (None, None) => Ok(Some(true)),
                    (Some(_), None) => Ok(Some(false)),
                    (None, Some(_)) => Ok(Some(false)),
                    (Some(row), Some(inner)) => {
                        Ok(Some(self.eval(target, row, inner)? == Some(true)))
                    }
                }
            }
            RelationOp::IsNot(inner) => {
                let related = self.to_one(entity, record, relation)?;
                match (related, inner) {
                    (None, None) => Ok(Some(false)),
                    (Some(_), None) => Ok(Some(true)),
                    (None, Some(_)) => Ok(Some(true)),
                    (Some(row), Some(inner)) => {
                        Ok(Some(self.eval(target, row, inner)? != Some(true)))
                    }
                }
            }
        }
    }

    /// Rows of the target entity whose foreign key points at `record`.
    fn children(
        &self,
        entity: &EntityDef,
        record: &Record,
        relation: &RelationDef,
    ) -> StoreResult<Vec<&'a Record>> {
        let id = record.id().ok_or_else(|| {
            StoreError::validation(format!("{} row has no id", entity.name))
        })?;
        let table = self.store.table(&relation.target)?;
        Ok(table
            .scan()
            .filter(|row| row.get(&relation.fk_field) == Some(&Value::Uuid(id)))
            .collect())
    }

    /// The single related row of a to-one relation, if present.
    fn to_one(
        &self,
        entity: &EntityDef,
        record: &Record,
        relation: &RelationDef,
    ) -> StoreResult<Option<&'a Record>> {
        use deckdb_schema::RelationKind;
        match relation.kind {
            RelationKind::HasOne => {
                Ok(self.children(entity, record, relation)?.into_iter().next())
            }
            RelationKind::BelongsTo => {
                let fk = record.get_or_null(&relation.fk_field);
                match fk.as_uuid() {
                    Some(id) => Ok(self.store.table(&relation.target)?.get(id)),
                    None => Ok(None),
                }
            }
            RelationKind::HasMany => Err(StoreError::validation(format!(
                "is/isNot on to-many relation {}.{}",
                entity.name, relation.name
            ))),
        }
    }
}

/// Evaluate a field comparison. A null stored value makes every comparison
/// unknown except the dedicated null test, which is total.
fn eval_field_op(value: &Value, op: &FieldOp) -> Option<bool> {
    use std::cmp::Ordering;

    if let FieldOp::IsNull(want_null) = op {
        return Some(value.is_null() == *want_null);
    }
    if value.is_null() {
        return None;
    }

    match op {
        FieldOp::Equals(operand) => Some(value == operand),
        FieldOp::In(operands) => Some(operands.contains(value)),
        FieldOp::NotIn(operands) => Some(!operands.contains(value)),
        FieldOp::Lt(operand) => Some(value.cmp_sortable(operand) == Ordering::Less),
        FieldOp::Lte(operand) => Some(value.cmp_sortable(operand) != Ordering::Greater),
        FieldOp::Gt(operand) => Some(value.cmp_sortable(operand) == Ordering::Greater),
        FieldOp::Gte(operand) => Some(value.cmp_sortable(operand) != Ordering::Less),
        FieldOp::Contains(needle, mode) => {
            string_test(value, needle, *mode, |haystack, needle| {
                haystack.contains(needle)
            })
        }
        FieldOp::StartsWith(prefix, mode) => {
            string_test(value, prefix, *mode, |haystack, prefix| {
                haystack.starts_with(prefix)
            })
        }
        FieldOp::EndsWith(suffix, mode) => {
            string_test(value, suffix, *mode, |haystack, suffix| {
                haystack.ends_with(suffix)
            })
        }
        FieldOp::IsNull(_) => unreachable!("handled above"),
    }
}

fn string_test(
    value: &Value,
    operand: &str,
    mode: StringMode,
    test: impl Fn(&str, &str) -> bool,
) -> Option<bool> {
    let haystack = value.as_str()?;
    match mode {
        StringMode::Sensitive => Some(test(haystack, operand)),
        StringMode::Insensitive => Some(test(&haystack.to_lowercase(), &operand.to_lowercase())),
    }
}
