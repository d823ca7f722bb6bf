//! Mutation execution.

use crate::cascade;
use crate::input::{CreateInput, NestedWrite, UpdateInput};
use chrono::Utc;
use deckdb_core::{Record, StoreError, StoreResult, Value};
use deckdb_filter::{Filter, FilterEvaluator};
use deckdb_query::UniqueKey;
use deckdb_schema::{
    EntityDef, FieldDef, FieldDefault, FieldKind, RelationDef, RelationKind, SchemaRegistry,
};
use deckdb_store::Store;
use uuid::Uuid;

/// Write-side engine. Holds only the schema; the store to mutate is passed
/// per call so the transaction coordinator can hand in whichever store
/// generation is current.
pub struct MutationEngine<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> MutationEngine<'a> {
    /// Create a new engine.
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Create one row, resolving nested writes, and return it as stored.
    pub fn create(
        &self,
        store: &mut Store,
        entity: &str,
        input: CreateInput,
    ) -> StoreResult<Record> {
        atomically(store, |store| self.create_inner(store, entity, input))
    }

    /// Bulk create from plain field maps (no nested writes). Returns the
    /// number of rows inserted. With `skip_duplicates`, unique-key
    /// conflicts drop the offending row instead of failing the batch.
    pub fn create_many(
        &self,
        store: &mut Store,
        entity: &str,
        inputs: Vec<Record>,
        skip_duplicates: bool,
    ) -> StoreResult<usize> {
        atomically(store, |store| {
            Ok(self
                .create_many_inner(store, entity, inputs, skip_duplicates)?
                .len())
        })
    }

    /// Like [`create_many`](Self::create_many), returning the inserted rows.
    pub fn create_many_and_return(
        &self,
        store: &mut Store,
        entity: &str,
        inputs: Vec<Record>,
        skip_duplicates: bool,
    ) -> StoreResult<Vec<Record>> {
        atomically(store, |store| {
            self.create_many_inner(store, entity, inputs, skip_duplicates)
        })
    }

    /// Update the row holding the unique key. Missing row is `NotFound`.
    pub fn update(
        &self,
        store: &mut Store,
        entity: &str,
        key: &UniqueKey,
        input: UpdateInput,
    ) -> StoreResult<Record> {
        atomically(store, |store| self.update_inner(store, entity, key, input))
    }

    /// Apply the same scalar changes to every row matching the filter,
    /// stopping after `limit` rows when given. Returns the affected count;
    /// zero matches is not an error.
    pub fn update_many(
        &self,
        store: &mut Store,
        entity: &str,
        filter: Option<&Filter>,
        data: &Record,
        limit: Option<usize>,
    ) -> StoreResult<usize> {
        atomically(store, |store| {
            Ok(self
                .update_many_inner(store, entity, filter, data, limit)?
                .len())
        })
    }

    /// Like [`update_many`](Self::update_many), returning the updated rows.
    pub fn update_many_and_return(
        &self,
        store: &mut Store,
        entity: &str,
        filter: Option<&Filter>,
        data: &Record,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        atomically(store, |store| {
            self.update_many_inner(store, entity, filter, data, limit)
        })
    }

    /// Update the row holding the key, or create it when absent. The whole
    /// decision and write happen inside one snapshot.
    pub fn upsert(
        &self,
        store: &mut Store,
        entity: &str,
        key: &UniqueKey,
        create: CreateInput,
        update: UpdateInput,
    ) -> StoreResult<Record> {
        atomically(store, |store| {
            let def = self.entity(entity)?;
            self.check_unique_key(def, key)?;
            if store.table(entity)?.find_by_unique(key).is_some() {
                self.update_inner(store, entity, key, update)
            } else {
                self.create_inner(store, entity, create)
            }
        })
    }

    /// Delete the row holding the key, walking delete policies. Returns
    /// the deleted row.
    pub fn delete(&self, store: &mut Store, entity: &str, key: &UniqueKey) -> StoreResult<Record> {
        atomically(store, |store| {
            let def = self.entity(entity)?;
            self.check_unique_key(def, key)?;
            let row = store
                .table(entity)?
                .find_by_unique(key)
                .cloned()
                .ok_or_else(|| StoreError::not_found(entity))?;
            let id = row
                .id()
                .ok_or_else(|| StoreError::validation(format!("{} row has no id", entity)))?;
            cascade::delete_row(self.registry, store, entity, id)?;
            Ok(row)
        })
    }

    /// Delete every row matching the filter, policies included. Returns
    /// the number of directly matched rows deleted.
    pub fn delete_many(
        &self,
        store: &mut Store,
        entity: &str,
        filter: Option<&Filter>,
        limit: Option<usize>,
    ) -> StoreResult<usize> {
        atomically(store, |store| {
            let ids = self.matching_ids(store, entity, filter, limit)?;
            let mut count = 0;
            for id in ids {
                // A cascade from an earlier row may already have taken this one.
                if store.table(entity)?.get(id).is_none() {
                    continue;
                }
                cascade::delete_row(self.registry, store, entity, id)?;
                count += 1;
            }
            Ok(count)
        })
    }

    fn entity(&self, name: &str) -> StoreResult<&'a EntityDef> {
        self.registry
            .entity(name)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", name)))
    }

    // ==================== Create ====================

    fn create_inner(
        &self,
        store: &mut Store,
        name: &str,
        input: CreateInput,
    ) -> StoreResult<Record> {
        let entity = self.entity(name)?;
        let CreateInput { mut fields, nested } = input;

        // Parent links resolve before the insert (they produce this row's
        // foreign keys); child writes run after it (they need this row's id).
        let mut child_writes: Vec<(RelationDef, NestedWrite)> = Vec::new();
        for (relation_name, write) in nested {
            let relation = entity.relation(&relation_name).ok_or_else(|| {
                StoreError::validation(format!("unknown relation {}.{}", name, relation_name))
            })?;
            if !write.allowed_in_create() {
                return Err(StoreError::validation(format!(
                    "nested write on {}.{} is not allowed in create",
                    name, relation_name
                )));
            }
            match relation.kind {
                RelationKind::BelongsTo => {
                    let parent = self.resolve_parent(store, relation, write)?;
                    fields.set(relation.fk_field.clone(), parent);
                }
                RelationKind::HasMany | RelationKind::HasOne => {
                    child_writes.push((relation.clone(), write));
                }
            }
        }

        let record = self.build_record(entity, fields)?;
        self.check_references(store, entity, &record)?;
        let id = store.table_mut(name)?.insert(record)?;

        for (relation, write) in child_writes {
            self.apply_child_write(store, &relation, id, write)?;
        }

        store
            .table(name)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(name))
    }

    fn create_many_inner(
        &self,
        store: &mut Store,
        name: &str,
        inputs: Vec<Record>,
        skip_duplicates: bool,
    ) -> StoreResult<Vec<Record>> {
        let entity = self.entity(name)?;
        let mut inserted = Vec::new();
        for fields in inputs {
            let record = self.build_record(entity, fields)?;
            self.check_references(store, entity, &record)?;
            match store.table_mut(name)?.insert(record.clone()) {
                Ok(_) => inserted.push(record),
                Err(err) if skip_duplicates && err.is_unique_violation() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(inserted)
    }

    /// Materialize a full row from a create payload: defaults fill missing
    /// fields, every value is schema-checked, unknown fields are rejected.
    fn build_record(&self, entity: &EntityDef, fields: Record) -> StoreResult<Record> {
        let mut provided = fields.into_fields();
        let mut record = Record::new();
        for def in entity.fields_in_order() {
            let value = match provided.remove(&def.name) {
                Some(value) => value,
                None => match def.default {
                    Some(FieldDefault::UuidV4) => Value::Uuid(Uuid::new_v4()),
                    Some(FieldDefault::Now) => Value::DateTime(Utc::now()),
                    None if def.nullable => Value::Null,
                    None => {
                        return Err(StoreError::validation(format!(
                            "missing required field {}.{}",
                            entity.name, def.name
                        )))
                    }
                },
            };
            self.check_value(entity, def, &value)?;
            record.set(def.name.clone(), value);
        }
        if let Some((name, _)) = provided.into_iter().next() {
            return Err(StoreError::validation(format!(
                "unknown field {}.{}",
                entity.name, name
            )));
        }
        Ok(record)
    }

    // ==================== Update ====================

    fn update_inner(
        &self,
        store: &mut Store,
        name: &str,
        key: &UniqueKey,
        input: UpdateInput,
    ) -> StoreResult<Record> {
        let entity = self.entity(name)?;
        self.check_unique_key(entity, key)?;
        let row = store
            .table(name)?
            .find_by_unique(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(name))?;
        let id = row
            .id()
            .ok_or_else(|| StoreError::validation(format!("{} row has no id", name)))?;

        let UpdateInput { fields, nested } = input;
        let mut updated = self.apply_scalars(entity, row, &fields)?;
        self.check_references(store, entity, &fields)?;
        self.touch(entity, &mut updated, &fields);
        store.table_mut(name)?.update(id, updated)?;

        for (relation_name, write) in nested {
            let relation = entity.relation(&relation_name).ok_or_else(|| {
                StoreError::validation(format!("unknown relation {}.{}", name, relation_name))
            })?;
            match relation.kind {
                RelationKind::BelongsTo => {
                    self.apply_parent_write(store, name, relation, id, write)?
                }
                RelationKind::HasMany | RelationKind::HasOne => {
                    self.apply_child_write(store, relation, id, write)?
                }
            }
        }

        store
            .table(name)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(name))
    }

    fn update_many_inner(
        &self,
        store: &mut Store,
        name: &str,
        filter: Option<&Filter>,
        data: &Record,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        let entity = self.entity(name)?;
        self.check_references(store, entity, data)?;
        let ids = self.matching_ids(store, name, filter, limit)?;
        let mut updated_rows = Vec::with_capacity(ids.len());
        for id in ids {
            let row = store
                .table(name)?
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(name))?;
            let mut updated = self.apply_scalars(entity, row, data)?;
            self.touch(entity, &mut updated, data);
            store.table_mut(name)?.update(id, updated.clone())?;
            updated_rows.push(updated);
        }
        Ok(updated_rows)
    }

    /// Overlay scalar changes on a row. The primary key is immutable.
    fn apply_scalars(
        &self,
        entity: &EntityDef,
        mut row: Record,
        data: &Record,
    ) -> StoreResult<Record> {
        for (name, value) in data.iter() {
            if name == "id" {
                return Err(StoreError::validation(format!(
                    "{}.id is immutable",
                    entity.name
                )));
            }
            let field = entity.field(name).ok_or_else(|| {
                StoreError::validation(format!("unknown field {}.{}", entity.name, name))
            })?;
            self.check_value(entity, field, value)?;
            row.set(name.clone(), value.clone());
        }
        Ok(row)
    }

    /// Refresh `updated_at` unless the payload set it explicitly.
    fn touch(&self, entity: &EntityDef, row: &mut Record, explicit: &Record) {
        if entity.has_field("updated_at") && !explicit.contains("updated_at") {
            row.set("updated_at", Utc::now());
        }
    }

    // ==================== Nested writes ====================

    /// Resolve a nested write on a BelongsTo relation to the parent row id.
    fn resolve_parent(
        &self,
        store: &mut Store,
        relation: &RelationDef,
        write: NestedWrite,
    ) -> StoreResult<Uuid> {
        match write {
            NestedWrite::Create(input) => {
                let parent = self.create_inner(store, &relation.target, input)?;
                parent.id().ok_or_else(|| {
                    StoreError::validation(format!("{} row has no id", relation.target))
                })
            }
            NestedWrite::Connect(key) => self.connect_target(store, relation, &key),
            NestedWrite::ConnectOrCreate { key, create } => {
                let target = self.entity(&relation.target)?;
                self.check_unique_key(target, &key)?;
                let existing = store
                    .table(&relation.target)?
                    .find_by_unique(&key)
                    .and_then(Record::id);
                match existing {
                    Some(id) => Ok(id),
                    None => {
                        let parent = self.create_inner(store, &relation.target, create)?;
                        parent.id().ok_or_else(|| {
                            StoreError::validation(format!("{} row has no id", relation.target))
                        })
                    }
                }
            }
            NestedWrite::Upsert { .. } | NestedWrite::Delete(_) | NestedWrite::Disconnect(_) => {
                Err(StoreError::validation(format!(
                    "unsupported nested write on relation {}",
                    relation.name
                )))
            }
        }
    }

    /// Apply a nested write on a BelongsTo relation during update: the row
    /// `id` of entity `holder` carries the foreign key being rewired.
    fn apply_parent_write(
        &self,
        store: &mut Store,
        holder: &str,
        relation: &RelationDef,
        id: Uuid,
        write: NestedWrite,
    ) -> StoreResult<()> {
        match write {
            NestedWrite::Create(_) | NestedWrite::Connect(_) | NestedWrite::ConnectOrCreate { .. } => {
                let parent = self.resolve_parent(store, relation, write)?;
                self.set_field(store, holder, id, &relation.fk_field, Value::Uuid(parent))
            }
            NestedWrite::Upsert { key, update, create } => {
                let target = self.entity(&relation.target)?;
                self.check_unique_key(target, &key)?;
                let existing = store
                    .table(&relation.target)?
                    .find_by_unique(&key)
                    .and_then(Record::id);
                let parent = match existing {
                    Some(parent) => {
                        let by_id = vec![("id".to_string(), Value::Uuid(parent))];
                        self.update_inner(store, &relation.target, &by_id, update)?;
                        parent
                    }
                    None => self
                        .create_inner(store, &relation.target, create)?
                        .id()
                        .ok_or_else(|| {
                            StoreError::validation(format!("{} row has no id", relation.target))
                        })?,
                };
                self.set_field(store, holder, id, &relation.fk_field, Value::Uuid(parent))
            }
            NestedWrite::Delete(None) => {
                let fk = store
                    .table(holder)?
                    .get(id)
                    .ok_or_else(|| StoreError::not_found(holder))?
                    .get_or_null(&relation.fk_field);
                match fk.as_uuid() {
                    Some(parent) => {
                        cascade::delete_row(self.registry, store, &relation.target, parent)
                    }
                    None => Err(StoreError::not_found(&relation.target)),
                }
            }
            NestedWrite::Disconnect(None) => {
                let holder_def = self.entity(holder)?;
                self.check_disconnectable(holder_def, &relation.fk_field)?;
                self.set_field(store, holder, id, &relation.fk_field, Value::Null)
            }
            NestedWrite::Delete(Some(_)) | NestedWrite::Disconnect(Some(_)) => {
                Err(StoreError::validation(format!(
                    "nested write on to-one relation {} takes no key",
                    relation.name
                )))
            }
        }
    }

    /// Apply a nested write on a HasMany/HasOne relation: the foreign key
    /// lives on the target and points at `parent_id`.
    fn apply_child_write(
        &self,
        store: &mut Store,
        relation: &RelationDef,
        parent_id: Uuid,
        write: NestedWrite,
    ) -> StoreResult<()> {
        let target = self.entity(&relation.target)?;
        match write {
            NestedWrite::Create(mut input) => {
                input.fields.set(relation.fk_field.clone(), parent_id);
                self.create_inner(store, &relation.target, input)?;
                Ok(())
            }
            NestedWrite::Connect(key) => {
                let child = self.connect_target(store, relation, &key)?;
                self.set_field(
                    store,
                    &relation.target,
                    child,
                    &relation.fk_field,
                    Value::Uuid(parent_id),
                )
            }
            NestedWrite::ConnectOrCreate { key, create } => {
                self.check_unique_key(target, &key)?;
                let existing = store
                    .table(&relation.target)?
                    .find_by_unique(&key)
                    .and_then(Record::id);
                match existing {
                    Some(child) => self.set_field(
                        store,
                        &relation.target,
                        child,
                        &relation.fk_field,
                        Value::Uuid(parent_id),
                    ),
                    None => {
                        let mut create = create;
                        create.fields.set(relation.fk_field.clone(), parent_id);
                        self.create_inner(store, &relation.target, create)?;
                        Ok(())
                    }
                }
            }
            NestedWrite::Upsert { key, update, create } => {
                self.check_unique_key(target, &key)?;
                let existing = store
                    .table(&relation.target)?
                    .find_by_unique(&key)
                    .and_then(Record::id);
                match existing {
                    Some(child) => {
                        let by_id = vec![("id".to_string(), Value::Uuid(child))];
                        self.update_inner(store, &relation.target, &by_id, update)?;
                        self.set_field(
                            store,
                            &relation.target,
                            child,
                            &relation.fk_field,
                            Value::Uuid(parent_id),
                        )
                    }
                    None => {
                        let mut create = create;
                        create.fields.set(relation.fk_field.clone(), parent_id);
                        self.create_inner(store, &relation.target, create)?;
                        Ok(())
                    }
                }
            }
            NestedWrite::Delete(Some(key)) => {
                let child = self.connect_target(store, relation, &key)?;
                cascade::delete_row(self.registry, store, &relation.target, child)
            }
            NestedWrite::Delete(None) => {
                if relation.kind != RelationKind::HasOne {
                    return Err(StoreError::validation(format!(
                        "nested write on to-many relation {} needs a key",
                        relation.name
                    )));
                }
                let child = self
                    .child_of(store, relation, parent_id)?
                    .ok_or_else(|| StoreError::not_found(&relation.target))?;
                cascade::delete_row(self.registry, store, &relation.target, child)
            }
            NestedWrite::Disconnect(Some(key)) => {
                self.check_disconnectable(target, &relation.fk_field)?;
                let child = self.connect_target(store, relation, &key)?;
                self.set_field(store, &relation.target, child, &relation.fk_field, Value::Null)
            }
            NestedWrite::Disconnect(None) => {
                if relation.kind != RelationKind::HasOne {
                    return Err(StoreError::validation(format!(
                        "nested write on to-many relation {} needs a key",
                        relation.name
                    )));
                }
                self.check_disconnectable(target, &relation.fk_field)?;
                let child = self
                    .child_of(store, relation, parent_id)?
                    .ok_or_else(|| StoreError::not_found(&relation.target))?;
                self.set_field(store, &relation.target, child, &relation.fk_field, Value::Null)
            }
        }
    }

    /// Find the row a `Connect` points at. The key must be unique on the
    /// target and the row must exist.
    fn connect_target(
        &self,
        store: &Store,
        relation: &RelationDef,
        key: &UniqueKey,
    ) -> StoreResult<Uuid> {
        let target = self.entity(&relation.target)?;
        self.check_unique_key(target, key)?;
        store
            .table(&relation.target)?
            .find_by_unique(key)
            .and_then(Record::id)
            .ok_or_else(|| StoreError::not_found(&relation.target))
    }

    /// The single dependent of a HasOne relation, if present.
    fn child_of(
        &self,
        store: &Store,
        relation: &RelationDef,
        parent_id: Uuid,
    ) -> StoreResult<Option<Uuid>> {
        Ok(store
            .table(&relation.target)?
            .scan()
            .find(|row| row.get(&relation.fk_field) == Some(&Value::Uuid(parent_id)))
            .and_then(Record::id))
    }

    fn set_field(
        &self,
        store: &mut Store,
        entity: &str,
        id: Uuid,
        field: &str,
        value: Value,
    ) -> StoreResult<()> {
        let table = store.table_mut(entity)?;
        let mut row = table
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(entity))?;
        row.set(field.to_string(), value);
        table.update(id, row)
    }

    fn check_disconnectable(&self, target: &EntityDef, fk_field: &str) -> StoreResult<()> {
        let nullable = target.field(fk_field).is_some_and(|f| f.nullable);
        if nullable {
            Ok(())
        } else {
            Err(StoreError::validation(format!(
                "cannot disconnect required key {}.{}",
                target.name, fk_field
            )))
        }
    }

    // ==================== Shared checks ====================

    fn check_unique_key(&self, entity: &EntityDef, key: &UniqueKey) -> StoreResult<()> {
        let fields: Vec<String> = key.iter().map(|(name, _)| name.clone()).collect();
        if !entity.is_unique_key(&fields) {
            return Err(StoreError::validation(format!(
                "({}) is not a unique key of {}",
                fields.join(", "),
                entity.name
            )));
        }
        for (name, value) in key {
            if value.is_null() {
                return Err(StoreError::validation(format!(
                    "unique key component {}.{} is null",
                    entity.name, name
                )));
            }
        }
        Ok(())
    }

    /// Every non-null foreign key written as a plain scalar must reference
    /// an existing target row. Only fields present in `fields` are checked,
    /// so updates that leave a key untouched pass.
    fn check_references(
        &self,
        store: &Store,
        entity: &EntityDef,
        fields: &Record,
    ) -> StoreResult<()> {
        for relation in entity.relations.values() {
            if relation.kind != RelationKind::BelongsTo {
                continue;
            }
            let value = match fields.get(&relation.fk_field) {
                Some(value) => value,
                None => continue,
            };
            if let Some(target_id) = value.as_uuid() {
                if store.table(&relation.target)?.get(target_id).is_none() {
                    return Err(StoreError::validation(format!(
                        "{}.{} references no {} row",
                        entity.name, relation.fk_field, relation.target
                    )));
                }
            }
        }
        Ok(())
    }

    /// Null, type, enum-membership and format checks for one field value.
    fn check_value(&self, entity: &EntityDef, field: &FieldDef, value: &Value) -> StoreResult<()> {
        if value.is_null() {
            if field.nullable {
                return Ok(());
            }
            return Err(StoreError::validation(format!(
                "null for required field {}.{}",
                entity.name, field.name
            )));
        }
        let ok = match &field.kind {
            FieldKind::String => matches!(value, Value::String(_)),
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            FieldKind::DateTime => matches!(value, Value::DateTime(_)),
            FieldKind::Uuid => matches!(value, Value::Uuid(_)),
            FieldKind::Enum(members) => value
                .as_str()
                .map(|s| members.iter().any(|m| m == s))
                .unwrap_or(false),
        };
        if !ok {
            return Err(StoreError::validation(format!(
                "value {} is not valid for field {}.{}",
                value, entity.name, field.name
            )));
        }
        if let Some(s) = value.as_str() {
            if !self.registry.format_matches(field, s) {
                return Err(StoreError::validation(format!(
                    "value {} does not match the {} format of {}.{}",
                    value,
                    field.format.as_deref().unwrap_or(""),
                    entity.name,
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Ids of rows matching the filter, in scan order, up to `limit`.
    fn matching_ids(
        &self,
        store: &Store,
        name: &str,
        filter: Option<&Filter>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Uuid>> {
        self.entity(name)?;
        let evaluator = FilterEvaluator::new(self.registry, store);
        if let Some(filter) = filter {
            evaluator.validate(name, filter)?;
        }
        let mut ids = Vec::new();
        for record in store.table(name)?.scan() {
            if limit.is_some_and(|l| ids.len() >= l) {
                break;
            }
            let keep = match filter {
                Some(filter) => evaluator.matches(name, record, filter)?,
                None => true,
            };
            if keep {
                if let Some(id) = record.id() {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

/// Run a write under a snapshot: any error restores the store wholesale.
fn atomically<T>(
    store: &mut Store,
    f: impl FnOnce(&mut Store) -> StoreResult<T>,
) -> StoreResult<T> {
    let snapshot = store.clone();
    match f(store) {
        Ok(value) => Ok(value),
        Err(err) => {
            *store = snapshot;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckdb_schema::{deck_schema, SchemaRegistry};

    fn setup() -> (SchemaRegistry, Store) {
        let registry = deck_schema().unwrap();
        let store = Store::new(&registry);
        (registry, store)
    }

    fn user_input(email: &str) -> CreateInput {
        CreateInput::new()
            .set("email", email)
            .set("password_hash", "x")
            .set("role", "USER")
    }

    fn session_input(origin: &str) -> CreateInput {
        CreateInput::new()
            .set("origin", origin)
            .set("server_token", "tok")
            .set("server_type", "Misskey")
    }

    fn by_email(email: &str) -> UniqueKey {
        vec![("email".to_string(), Value::from(email))]
    }

    fn by_id(id: Uuid) -> UniqueKey {
        vec![("id".to_string(), Value::Uuid(id))]
    }

    #[test]
    fn test_create_fills_defaults() {
        // GIVEN
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);

        // WHEN
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();

        // THEN: id and timestamps assigned, nullable name is null
        assert!(user.id().is_some());
        assert!(user.get_or_null("created_at").as_datetime().is_some());
        assert!(user.get_or_null("updated_at").as_datetime().is_some());
        assert!(user.get_or_null("name").is_null());
    }

    #[test]
    fn test_create_rejects_bad_payloads() {
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);

        // Missing required field
        let missing = CreateInput::new().set("email", "a@x.com").set("role", "USER");
        assert!(matches!(
            engine.create(&mut store, "User", missing),
            Err(StoreError::Validation { .. })
        ));

        // Enum value outside the set
        let bad_role = user_input("a@x.com").set("role", "ROOT");
        assert!(engine.create(&mut store, "User", bad_role).is_err());

        // Format violation
        let bad_email = user_input("not-an-email");
        assert!(engine.create(&mut store, "User", bad_email).is_err());

        // Unknown field
        let unknown = user_input("a@x.com").set("nickname", "zed");
        assert!(engine.create(&mut store, "User", unknown).is_err());

        // Nothing was written
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn test_create_with_nested_parent_and_children() {
        // GIVEN
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();

        // WHEN: session connected to the user, with a timeline created inline
        let input = session_input("https://a.example")
            .nested("user", NestedWrite::Connect(by_id(user.id().unwrap())))
            .nested(
                "timelines",
                NestedWrite::Create(CreateInput::new().set("timeline_type", "HOME")),
            );
        let session = engine.create(&mut store, "ServerSession", input).unwrap();

        // THEN
        assert_eq!(session.get_or_null("user_id").as_uuid(), user.id());
        let timelines: Vec<_> = store
            .table("Timeline")
            .unwrap()
            .scan()
            .filter(|t| t.get_or_null("server_session_id").as_uuid() == session.id())
            .collect();
        assert_eq!(timelines.len(), 1);
    }

    #[test]
    fn test_connect_or_create_is_idempotent() {
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();

        for origin in ["https://a.example", "https://b.example"] {
            let input = session_input(origin).nested(
                "user",
                NestedWrite::ConnectOrCreate {
                    key: by_email("a@x.com"),
                    create: user_input("a@x.com"),
                },
            );
            let session = engine.create(&mut store, "ServerSession", input).unwrap();
            assert_eq!(session.get_or_null("user_id").as_uuid(), user.id());
        }
        assert_eq!(store.table("User").unwrap().len(), 1);
    }

    #[test]
    fn test_create_rolls_back_on_nested_failure() {
        // GIVEN
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();

        // WHEN: the nested timeline has an invalid enum value
        let input = session_input("https://a.example")
            .nested("user", NestedWrite::Connect(by_id(user.id().unwrap())))
            .nested(
                "timelines",
                NestedWrite::Create(CreateInput::new().set("timeline_type", "BOGUS")),
            );
        let result = engine.create(&mut store, "ServerSession", input);

        // THEN: neither the session nor the timeline survives
        assert!(result.is_err());
        assert_eq!(store.table("ServerSession").unwrap().len(), 0);
        assert_eq!(store.table("Timeline").unwrap().len(), 0);
    }

    #[test]
    fn test_compound_unique_enforced_across_creates() {
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();
        let connect = NestedWrite::Connect(by_id(user.id().unwrap()));

        engine
            .create(
                &mut store,
                "ServerSession",
                session_input("https://a.example").nested("user", connect.clone()),
            )
            .unwrap();

        let dup = engine.create(
            &mut store,
            "ServerSession",
            session_input("https://a.example").nested("user", connect),
        );
        match dup {
            Err(StoreError::UniqueViolation { entity, fields }) => {
                assert_eq!(entity, "ServerSession");
                assert_eq!(fields, vec!["origin".to_string(), "user_id".to_string()]);
            }
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[test]
    fn test_create_rejects_dangling_foreign_key() {
        // GIVEN: no users at all
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);

        // WHEN: the session's user_id is a plain scalar pointing nowhere
        let input = session_input("https://a.example").set("user_id", Uuid::new_v4());
        let result = engine.create(&mut store, "ServerSession", input);

        // THEN
        assert!(matches!(result, Err(StoreError::Validation { .. })));
        assert_eq!(store.row_count(), 0);

        // Same through the bulk path
        let mut row = Record::new();
        row.set("origin", "https://a.example");
        row.set("server_token", "tok");
        row.set("server_type", "Misskey");
        row.set("user_id", Uuid::new_v4());
        let result = engine.create_many(&mut store, "ServerSession", vec![row], false);
        assert!(matches!(result, Err(StoreError::Validation { .. })));
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn test_update_rejects_dangling_foreign_key() {
        // GIVEN: a session properly wired to its user
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();
        let session = engine
            .create(
                &mut store,
                "ServerSession",
                session_input("https://a.example")
                    .nested("user", NestedWrite::Connect(by_id(user.id().unwrap()))),
            )
            .unwrap();

        // WHEN: rewiring user_id to a row that does not exist
        let result = engine.update(
            &mut store,
            "ServerSession",
            &by_id(session.id().unwrap()),
            UpdateInput::new().set("user_id", Uuid::new_v4()),
        );

        // THEN: rejected, the original link survives
        assert!(matches!(result, Err(StoreError::Validation { .. })));
        let row = store
            .table("ServerSession")
            .unwrap()
            .get(session.id().unwrap())
            .unwrap();
        assert_eq!(row.get_or_null("user_id").as_uuid(), user.id());

        // update_many with a dangling key fails before touching any row
        let mut data = Record::new();
        data.set("user_id", Uuid::new_v4());
        let result = engine.update_many(&mut store, "ServerSession", None, &data, None);
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }

    #[test]
    fn test_update_applies_scalars_and_touches_updated_at() {
        // GIVEN
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();

        // WHEN
        let updated = engine
            .update(
                &mut store,
                "User",
                &by_email("a@x.com"),
                UpdateInput::new().set("name", "Ada"),
            )
            .unwrap();

        // THEN
        assert_eq!(updated.get_or_null("name").as_str(), Some("Ada"));
        let before = user.get_or_null("updated_at").as_datetime().unwrap();
        let after = updated.get_or_null("updated_at").as_datetime().unwrap();
        assert!(after >= before);
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);

        let result = engine.update(
            &mut store,
            "User",
            &by_email("ghost@x.com"),
            UpdateInput::new().set("name", "Ada"),
        );
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_update_rejects_id_change() {
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        engine.create(&mut store, "User", user_input("a@x.com")).unwrap();

        let result = engine.update(
            &mut store,
            "User",
            &by_email("a@x.com"),
            UpdateInput::new().set("id", Uuid::new_v4()),
        );
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        // GIVEN
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let key = by_email("a@x.com");

        // WHEN: first call creates
        let created = engine
            .upsert(
                &mut store,
                "User",
                &key,
                user_input("a@x.com"),
                UpdateInput::new().set("name", "Ada"),
            )
            .unwrap();
        assert!(created.get_or_null("name").is_null());

        // WHEN: second call updates in place
        let updated = engine
            .upsert(
                &mut store,
                "User",
                &key,
                user_input("a@x.com"),
                UpdateInput::new().set("name", "Ada"),
            )
            .unwrap();

        // THEN
        assert_eq!(updated.get_or_null("name").as_str(), Some("Ada"));
        assert_eq!(store.table("User").unwrap().len(), 1);
        assert_eq!(created.id(), updated.id());
    }

    #[test]
    fn test_delete_cascades_session_owned_rows() {
        // GIVEN: a session with a timeline, a panel, server info and a profile
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();
        let session = engine
            .create(
                &mut store,
                "ServerSession",
                session_input("https://a.example")
                    .nested("user", NestedWrite::Connect(by_id(user.id().unwrap())))
                    .nested(
                        "timelines",
                        NestedWrite::Create(CreateInput::new().set("timeline_type", "HOME")),
                    )
                    .nested(
                        "panels",
                        NestedWrite::Create(CreateInput::new().set("panel_type", "notifications")),
                    )
                    .nested(
                        "server_info",
                        NestedWrite::Create(CreateInput::new().set("name", "A Server")),
                    )
                    .nested(
                        "profile",
                        NestedWrite::Create(CreateInput::new().set("username", "ada@a.example")),
                    ),
            )
            .unwrap();

        // WHEN
        engine
            .delete(&mut store, "ServerSession", &by_id(session.id().unwrap()))
            .unwrap();

        // THEN: the whole owned subtree is gone, the user survives
        for entity in ["ServerSession", "Timeline", "Panel", "ServerInfo", "UserInfo"] {
            assert_eq!(store.table(entity).unwrap().len(), 0, "{} not cascaded", entity);
        }
        assert_eq!(store.table("User").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_user_restricted_by_sessions() {
        // GIVEN
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();
        engine
            .create(
                &mut store,
                "ServerSession",
                session_input("https://a.example")
                    .nested("user", NestedWrite::Connect(by_id(user.id().unwrap()))),
            )
            .unwrap();

        // WHEN
        let result = engine.delete(&mut store, "User", &by_email("a@x.com"));

        // THEN: blocked, and nothing was deleted
        assert!(matches!(result, Err(StoreError::Restrict { .. })));
        assert_eq!(store.table("User").unwrap().len(), 1);
        assert_eq!(store.table("ServerSession").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_user_clears_cached_profile_links() {
        // GIVEN: user B owns a session whose cached profile points at user A
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let a = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();
        let b = engine.create(&mut store, "User", user_input("b@x.com")).unwrap();
        let session = engine
            .create(
                &mut store,
                "ServerSession",
                session_input("https://a.example")
                    .nested("user", NestedWrite::Connect(by_id(b.id().unwrap()))),
            )
            .unwrap();
        let info = engine
            .create(
                &mut store,
                "UserInfo",
                CreateInput::new()
                    .set("server_session_id", session.id().unwrap())
                    .set("user_id", a.id().unwrap())
                    .set("username", "ada@a.example"),
            )
            .unwrap();

        // WHEN: deleting A must not be blocked by the cached profile
        engine.delete(&mut store, "User", &by_email("a@x.com")).unwrap();

        // THEN: the profile survives with its user link cleared
        let info = store
            .table("UserInfo")
            .unwrap()
            .get(info.id().unwrap())
            .unwrap();
        assert!(info.get_or_null("user_id").is_null());
    }

    #[test]
    fn test_create_many_skip_duplicates() {
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);

        let rows = |emails: &[&str]| -> Vec<Record> {
            emails
                .iter()
                .map(|email| {
                    let mut record = Record::new();
                    record.set("email", *email);
                    record.set("password_hash", "x");
                    record.set("role", "USER");
                    record
                })
                .collect()
        };

        // Duplicates skipped: two distinct rows land
        let count = engine
            .create_many(&mut store, "User", rows(&["a@x.com", "a@x.com", "b@x.com"]), true)
            .unwrap();
        assert_eq!(count, 2);

        // Without skipping, the batch fails atomically
        let before = store.table("User").unwrap().len();
        let result = engine.create_many(&mut store, "User", rows(&["c@x.com", "a@x.com"]), false);
        assert!(result.unwrap_err().is_unique_violation());
        assert_eq!(store.table("User").unwrap().len(), before);
    }

    #[test]
    fn test_update_many_with_filter_and_limit() {
        // GIVEN
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            engine.create(&mut store, "User", user_input(email)).unwrap();
        }

        // WHEN: name every USER, but at most two
        let data = {
            let mut record = Record::new();
            record.set("name", "member");
            record
        };
        let count = engine
            .update_many(
                &mut store,
                "User",
                Some(&Filter::equals("role", "USER")),
                &data,
                Some(2),
            )
            .unwrap();

        // THEN
        assert_eq!(count, 2);
        let named = store
            .table("User")
            .unwrap()
            .scan()
            .filter(|u| !u.get_or_null("name").is_null())
            .count();
        assert_eq!(named, 2);

        // Zero matches is a zero count, not an error
        let none = engine
            .update_many(
                &mut store,
                "User",
                Some(&Filter::equals("email", "ghost@x.com")),
                &data,
                None,
            )
            .unwrap();
        assert_eq!(none, 0);
    }

    #[test]
    fn test_delete_many_counts_matched_rows() {
        // GIVEN: two sessions for one user
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();
        for origin in ["https://a.example", "https://b.example"] {
            engine
                .create(
                    &mut store,
                    "ServerSession",
                    session_input(origin)
                        .nested("user", NestedWrite::Connect(by_id(user.id().unwrap()))),
                )
                .unwrap();
        }

        // WHEN
        let count = engine
            .delete_many(&mut store, "ServerSession", None, None)
            .unwrap();

        // THEN
        assert_eq!(count, 2);
        assert!(store.table("ServerSession").unwrap().is_empty());
    }

    #[test]
    fn test_nested_disconnect_requires_nullable_key() {
        // GIVEN: a user with a cached profile linked through the nullable fk
        let (registry, mut store) = setup();
        let engine = MutationEngine::new(&registry);
        let user = engine.create(&mut store, "User", user_input("a@x.com")).unwrap();
        let owner = engine.create(&mut store, "User", user_input("b@x.com")).unwrap();
        let session = engine
            .create(
                &mut store,
                "ServerSession",
                session_input("https://a.example")
                    .nested("user", NestedWrite::Connect(by_id(owner.id().unwrap()))),
            )
            .unwrap();
        let info = engine
            .create(
                &mut store,
                "UserInfo",
                CreateInput::new()
                    .set("server_session_id", session.id().unwrap())
                    .set("user_id", user.id().unwrap())
                    .set("username", "ada@a.example"),
            )
            .unwrap();

        // WHEN: disconnecting the nullable user link works
        engine
            .update(
                &mut store,
                "UserInfo",
                &by_id(info.id().unwrap()),
                UpdateInput::new().nested("user", NestedWrite::Disconnect(None)),
            )
            .unwrap();
        let info_row = store
            .table("UserInfo")
            .unwrap()
            .get(info.id().unwrap())
            .unwrap()
            .clone();
        assert!(info_row.get_or_null("user_id").is_null());

        // WHEN: disconnecting the required session link is rejected
        let result = engine.update(
            &mut store,
            "UserInfo",
            &by_id(info.id().unwrap()),
            UpdateInput::new().nested("server_session", NestedWrite::Disconnect(None)),
        );
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }
}
