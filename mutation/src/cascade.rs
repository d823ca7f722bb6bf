//! Delete-policy walk.
//!
//! Deleting a row walks the relations its entity declares over dependents:
//! `Cascade` dependents join the delete set transitively, `Restrict`
//! dependents outside the delete set block the whole delete, and `SetNull`
//! dependents outside the delete set get their foreign key cleared.

use deckdb_core::{Record, StoreError, StoreResult, Value};
use deckdb_schema::{OnDeleteAction, RelationDef, RelationKind, SchemaRegistry};
use deckdb_store::Store;
use std::collections::HashSet;
use uuid::Uuid;

/// Delete one row and everything its policies pull in. Callers wrap this
/// in a store snapshot; a `Restrict` error here leaves the store dirty.
pub(crate) fn delete_row(
    registry: &SchemaRegistry,
    store: &mut Store,
    entity: &str,
    id: Uuid,
) -> StoreResult<()> {
    // Transitive closure over Cascade edges.
    let mut closure: HashSet<(String, Uuid)> = HashSet::new();
    let mut queue = vec![(entity.to_string(), id)];
    while let Some((name, id)) = queue.pop() {
        if !closure.insert((name.clone(), id)) {
            continue;
        }
        let def = registry
            .entity(&name)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", name)))?;
        for relation in def.relations.values() {
            if relation.kind == RelationKind::BelongsTo
                || relation.on_delete != OnDeleteAction::Cascade
            {
                continue;
            }
            for child in child_ids(store, relation, id)? {
                queue.push((relation.target.clone(), child));
            }
        }
    }

    // With the delete set fixed, check Restrict edges and collect SetNull
    // targets. Dependents inside the set never block or need clearing.
    let mut set_null: Vec<(String, Uuid, String)> = Vec::new();
    for (name, id) in &closure {
        let def = registry
            .entity(name)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", name)))?;
        for relation in def.relations.values() {
            if relation.kind == RelationKind::BelongsTo {
                continue;
            }
            match relation.on_delete {
                OnDeleteAction::Cascade => {}
                OnDeleteAction::Restrict => {
                    for child in child_ids(store, relation, *id)? {
                        if !closure.contains(&(relation.target.clone(), child)) {
                            return Err(StoreError::restrict(name, &relation.name));
                        }
                    }
                }
                OnDeleteAction::SetNull => {
                    for child in child_ids(store, relation, *id)? {
                        if !closure.contains(&(relation.target.clone(), child)) {
                            set_null.push((
                                relation.target.clone(),
                                child,
                                relation.fk_field.clone(),
                            ));
                        }
                    }
                }
            }
        }
    }

    for (entity, child, fk_field) in set_null {
        let table = store.table_mut(&entity)?;
        if let Some(row) = table.get(child) {
            let mut row = row.clone();
            row.set(fk_field, Value::Null);
            table.update(child, row)?;
        }
    }
    for (entity, id) in closure {
        store.table_mut(&entity)?.remove(id);
    }
    Ok(())
}

fn child_ids(store: &Store, relation: &RelationDef, parent: Uuid) -> StoreResult<Vec<Uuid>> {
    Ok(store
        .table(&relation.target)?
        .scan()
        .filter(|row| row.get(&relation.fk_field) == Some(&Value::Uuid(parent)))
        .filter_map(Record::id)
        .collect())
}
