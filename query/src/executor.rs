//! Query execution.

use crate::args::{FindManyArgs, NullsOrder, OrderBy, Projection, Selection, SortOrder, UniqueKey};
use crate::result::QueryRow;
use deckdb_core::{Record, StoreError, StoreResult, Value};
use deckdb_filter::FilterEvaluator;
use deckdb_schema::{EntityDef, RelationDef, RelationKind, SchemaRegistry};
use deckdb_store::Store;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Read-side executor. Borrows the store immutably; queries never mutate.
pub struct QueryExecutor<'a> {
    registry: &'a SchemaRegistry,
    store: &'a Store,
    evaluator: FilterEvaluator<'a>,
}

impl<'a> QueryExecutor<'a> {
    /// Create a new executor.
    pub fn new(registry: &'a SchemaRegistry, store: &'a Store) -> Self {
        Self {
            registry,
            store,
            evaluator: FilterEvaluator::new(registry, store),
        }
    }

    /// Point lookup by unique key. The key must name one of the entity's
    /// unique key sets exactly; anything else is a validation error, even
    /// when no row could match.
    pub fn find_unique(
        &self,
        entity: &str,
        key: &UniqueKey,
        selection: &Selection,
    ) -> StoreResult<Option<QueryRow>> {
        let entity = self.entity(entity)?;
        self.validate_unique_key(entity, key)?;
        self.validate_selection(entity, selection)?;

        let table = self.store.table(&entity.name)?;
        match table.find_by_unique(key) {
            Some(record) => {
                let mut rows = self.shape(entity, vec![record.clone()], selection)?;
                Ok(Some(rows.remove(0)))
            }
            None => Ok(None),
        }
    }

    /// Like [`find_unique`](Self::find_unique), but a missing row is a
    /// `NotFound` error instead of `None`.
    pub fn find_unique_or_throw(
        &self,
        entity: &str,
        key: &UniqueKey,
        selection: &Selection,
    ) -> StoreResult<QueryRow> {
        self.find_unique(entity, key, selection)?
            .ok_or_else(|| StoreError::not_found(entity))
    }

    /// First row of the ordered, filtered window, or None.
    pub fn find_first(
        &self,
        entity: &str,
        args: &FindManyArgs,
    ) -> StoreResult<Option<QueryRow>> {
        let mut rows = self.find_many(entity, args)?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    /// Like [`find_first`](Self::find_first), but a missing row is a
    /// `NotFound` error.
    pub fn find_first_or_throw(
        &self,
        entity: &str,
        args: &FindManyArgs,
    ) -> StoreResult<QueryRow> {
        self.find_first(entity, args)?
            .ok_or_else(|| StoreError::not_found(entity))
    }

    /// List query. Pipeline order is fixed: filter, sort, distinct, then
    /// cursor/skip/take, then projection and relation loading.
    pub fn find_many(&self, entity: &str, args: &FindManyArgs) -> StoreResult<Vec<QueryRow>> {
        let entity = self.entity(entity)?;
        self.validate_args(entity, args)?;

        let records = self.select_records(entity, args)?;
        self.shape(entity, records, &args.selection)
    }

    fn entity(&self, name: &str) -> StoreResult<&'a EntityDef> {
        self.registry
            .entity(name)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", name)))
    }

    // ==================== Validation ====================

    fn validate_args(&self, entity: &EntityDef, args: &FindManyArgs) -> StoreResult<()> {
        if let Some(filter) = &args.filter {
            self.evaluator.validate(&entity.name, filter)?;
        }
        for order in &args.order {
            if !entity.has_field(&order.field) {
                return Err(StoreError::validation(format!(
                    "cannot order by unknown field {}.{}",
                    entity.name, order.field
                )));
            }
        }
        for field in &args.distinct {
            if !entity.has_field(field) {
                return Err(StoreError::validation(format!(
                    "cannot distinct on unknown field {}.{}",
                    entity.name, field
                )));
            }
        }
        if let Some(cursor) = &args.cursor {
            self.validate_unique_key(entity, cursor)?;
        }
        self.validate_selection(entity, &args.selection)
    }

    fn validate_unique_key(&self, entity: &EntityDef, key: &UniqueKey) -> StoreResult<()> {
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

    fn validate_selection(&self, entity: &EntityDef, selection: &Selection) -> StoreResult<()> {
        let named = match &selection.projection {
            Projection::All => &[][..],
            Projection::Select(fields) | Projection::Omit(fields) => fields,
        };
        for field in named {
            if !entity.has_field(field) {
                return Err(StoreError::validation(format!(
                    "cannot project unknown field {}.{}",
                    entity.name, field
                )));
            }
        }
        for (name, nested) in &selection.include {
            let relation = entity.relation(name).ok_or_else(|| {
                StoreError::validation(format!("unknown relation {}.{}", entity.name, name))
            })?;
            let target = self.entity(&relation.target)?;
            self.validate_args(target, nested)?;
        }
        Ok(())
    }

    // ==================== Selection pipeline ====================

    fn select_records(&self, entity: &EntityDef, args: &FindManyArgs) -> StoreResult<Vec<Record>> {
        let table = self.store.table(&entity.name)?;
        let mut rows = Vec::new();
        for record in table.scan() {
            let keep = match &args.filter {
                Some(filter) => self.evaluator.matches(&entity.name, record, filter)?,
                None => true,
            };
            if keep {
                rows.push(record.clone());
            }
        }

        sort_rows(&mut rows, &args.order);
        if !args.distinct.is_empty() {
            rows = distinct_rows(rows, &args.distinct);
        }
        Ok(paginate(rows, args))
    }

    // ==================== Result shaping ====================

    /// Load included relations, then project. Loading comes first because
    /// a projection may drop the keys the relations join on.
    fn shape(
        &self,
        entity: &EntityDef,
        records: Vec<Record>,
        selection: &Selection,
    ) -> StoreResult<Vec<QueryRow>> {
        let mut rows: Vec<QueryRow> = records.into_iter().map(QueryRow::bare).collect();

        for (name, nested) in &selection.include {
            let relation = entity.relation(name).ok_or_else(|| {
                StoreError::validation(format!("unknown relation {}.{}", entity.name, name))
            })?;
            self.load_relation(relation, &mut rows, nested)?;
        }

        for row in &mut rows {
            apply_projection(&mut row.record, &selection.projection);
        }
        Ok(rows)
    }

    /// Attach one relation's rows to every parent. The target table is
    /// scanned once for the whole parent batch, and the collected children
    /// are shaped as one batch too, so deeper includes also load their
    /// tables once per level rather than once per parent.
    fn load_relation(
        &self,
        relation: &RelationDef,
        parents: &mut [QueryRow],
        args: &FindManyArgs,
    ) -> StoreResult<()> {
        let target = self.entity(&relation.target)?;
        let table = self.store.table(&target.name)?;

        // Per-parent windows, flattened in parent order.
        let mut counts: Vec<usize> = Vec::with_capacity(parents.len());
        let mut children: Vec<Record> = Vec::new();

        match relation.kind {
            RelationKind::HasMany | RelationKind::HasOne => {
                let mut by_fk: HashMap<Uuid, Vec<Record>> = HashMap::new();
                for record in table.scan() {
                    let keep = match &args.filter {
                        Some(filter) => self.evaluator.matches(&target.name, record, filter)?,
                        None => true,
                    };
                    if !keep {
                        continue;
                    }
                    if let Some(fk) = record.get_or_null(&relation.fk_field).as_uuid() {
                        by_fk.entry(fk).or_default().push(record.clone());
                    }
                }

                for parent in parents.iter() {
                    let mut window = match parent.record.id() {
                        Some(id) => by_fk.get(&id).cloned().unwrap_or_default(),
                        None => Vec::new(),
                    };
                    sort_rows(&mut window, &args.order);
                    if !args.distinct.is_empty() {
                        window = distinct_rows(window, &args.distinct);
                    }
                    let window = paginate(window, args);
                    counts.push(window.len());
                    children.extend(window);
                }
            }
            RelationKind::BelongsTo => {
                for parent in parents.iter() {
                    let related = parent
                        .record
                        .get_or_null(&relation.fk_field)
                        .as_uuid()
                        .and_then(|id| table.get(id))
                        .cloned();
                    match related {
                        Some(record) => {
                            counts.push(1);
                            children.push(record);
                        }
                        None => counts.push(0),
                    }
                }
            }
        }

        let mut shaped = self.shape(target, children, &args.selection)?.into_iter();
        for (parent, count) in parents.iter_mut().zip(counts) {
            let rows: Vec<QueryRow> = shaped.by_ref().take(count).collect();
            parent.related.insert(relation.name.clone(), rows);
        }
        Ok(())
    }
}

/// Stable multi-key sort. Later keys only break ties of earlier ones, and
/// full ties keep insertion order.
fn sort_rows(rows: &mut [Record], order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in order {
            let ord = compare_by(a, b, key);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn compare_by(a: &Record, b: &Record, key: &OrderBy) -> Ordering {
    let av = a.get_or_null(&key.field);
    let bv = b.get_or_null(&key.field);
    match (av.is_null(), bv.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match key.nulls {
            NullsOrder::First => Ordering::Less,
            NullsOrder::Last => Ordering::Greater,
        },
        (false, true) => match key.nulls {
            NullsOrder::First => Ordering::Greater,
            NullsOrder::Last => Ordering::Less,
        },
        (false, false) => {
            let ord = av.cmp_sortable(&bv);
            match key.direction {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
    }
}

/// Keep the first row (in current order) for each distinct key tuple.
fn distinct_rows(rows: Vec<Record>, fields: &[String]) -> Vec<Record> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|record| {
            let key: Vec<Value> = fields.iter().map(|f| record.get_or_null(f)).collect();
            seen.insert(key)
        })
        .collect()
}

/// Apply cursor, skip, and take to an ordered window.
///
/// With a cursor, the anchor row itself is included; `skip` then counts
/// from the anchor (so `skip: 1` excludes it). A negative take walks the
/// window backward from the anchor (or from the end, without a cursor) but
/// the returned rows stay in window order. A missing cursor row yields an
/// empty result.
fn paginate(mut rows: Vec<Record>, args: &FindManyArgs) -> Vec<Record> {
    let backward = args.take.is_some_and(|take| take < 0);
    let limit = args.take.map(|take| take.unsigned_abs() as usize);

    if let Some(cursor) = &args.cursor {
        match rows.iter().position(|record| key_matches(record, cursor)) {
            Some(anchor) => {
                if backward {
                    rows.truncate(anchor + 1);
                } else {
                    rows.drain(..anchor);
                }
            }
            None => return Vec::new(),
        }
    }

    if backward {
        rows.reverse();
    }
    let iter = rows.into_iter().skip(args.skip);
    let mut out: Vec<Record> = match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    };
    if backward {
        out.reverse();
    }
    out
}

fn key_matches(record: &Record, key: &UniqueKey) -> bool {
    key.iter()
        .all(|(field, value)| record.get_or_null(field) == *value)
}

fn apply_projection(record: &mut Record, projection: &Projection) {
    match projection {
        Projection::All => {}
        Projection::Select(fields) => {
            let drop: Vec<String> = record
                .iter()
                .map(|(name, _)| name.clone())
                .filter(|name| !fields.contains(name))
                .collect();
            for name in drop {
                record.remove(&name);
            }
        }
        Projection::Omit(fields) => {
            for name in fields {
                record.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckdb_filter::Filter;
    use deckdb_schema::deck_schema;

    /// Five users named u0..u4 (u3 has a null name), the first two with
    /// sessions attached.
    fn fixture() -> (deckdb_schema::SchemaRegistry, Store, Vec<Uuid>) {
        let registry = deck_schema().unwrap();
        let mut store = Store::new(&registry);
        let mut ids = Vec::new();

        for i in 0..5 {
            let id = Uuid::new_v4();
            let mut user = Record::new();
            user.set("id", id);
            user.set("email", format!("u{}@x.com", i));
            if i == 3 {
                user.set("name", Value::Null);
            } else {
                user.set("name", format!("u{}", i));
            }
            user.set("role", "USER");
            store.table_mut("User").unwrap().insert(user).unwrap();
            ids.push(id);
        }

        for (user_index, origin) in [(0, "https://a.example"), (0, "https://b.example"), (1, "https://a.example")]
        {
            let mut session = Record::new();
            session.set("id", Uuid::new_v4());
            session.set("origin", origin);
            session.set("server_type", "Misskey");
            session.set("user_id", ids[user_index]);
            store
                .table_mut("ServerSession")
                .unwrap()
                .insert(session)
                .unwrap();
        }

        (registry, store, ids)
    }

    fn emails(rows: &[QueryRow]) -> Vec<String> {
        rows.iter()
            .map(|row| row.record.get("email").unwrap().as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_find_unique_by_compound_key() {
        // GIVEN
        let (registry, store, ids) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        // WHEN
        let key = vec![
            ("user_id".to_string(), Value::Uuid(ids[0])),
            ("origin".to_string(), Value::from("https://b.example")),
        ];
        let row = executor
            .find_unique("ServerSession", &key, &Selection::default())
            .unwrap();

        // THEN
        assert!(row.is_some());
    }

    #[test]
    fn test_find_unique_rejects_non_unique_key() {
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        // origin alone is not unique
        let key = vec![("origin".to_string(), Value::from("https://a.example"))];
        let result = executor.find_unique("ServerSession", &key, &Selection::default());
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }

    #[test]
    fn test_or_throw_agrees_with_plain_lookup() {
        // GIVEN: a key with no row behind it
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);
        let key = vec![("email".to_string(), Value::from("nobody@x.com"))];

        // THEN: plain lookup is None, or-throw is NotFound
        assert!(executor
            .find_unique("User", &key, &Selection::default())
            .unwrap()
            .is_none());
        assert!(matches!(
            executor.find_unique_or_throw("User", &key, &Selection::default()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_order_with_null_placement() {
        // GIVEN: u3 has a null name
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        // WHEN: ascending, nulls last (default)
        let rows = executor
            .find_many("User", &FindManyArgs::new().order_by(OrderBy::asc("name")))
            .unwrap();

        // THEN
        assert_eq!(
            emails(&rows),
            vec!["u0@x.com", "u1@x.com", "u2@x.com", "u4@x.com", "u3@x.com"]
        );

        // WHEN: nulls first
        let rows = executor
            .find_many(
                "User",
                &FindManyArgs::new().order_by(OrderBy::asc("name").nulls(NullsOrder::First)),
            )
            .unwrap();
        assert_eq!(emails(&rows)[0], "u3@x.com");
    }

    #[test]
    fn test_cursor_pagination_forward() {
        // GIVEN
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        // WHEN: anchor at u1, skip the anchor, take 2
        let args = FindManyArgs::new()
            .order_by(OrderBy::asc("email"))
            .cursor(vec![("email".to_string(), Value::from("u1@x.com"))])
            .skip(1)
            .take(2);
        let rows = executor.find_many("User", &args).unwrap();

        // THEN
        assert_eq!(emails(&rows), vec!["u2@x.com", "u3@x.com"]);
    }

    #[test]
    fn test_cursor_pagination_backward() {
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        // Anchor at u3, walk backward two rows including the anchor
        let args = FindManyArgs::new()
            .order_by(OrderBy::asc("email"))
            .cursor(vec![("email".to_string(), Value::from("u3@x.com"))])
            .take(-2);
        let rows = executor.find_many("User", &args).unwrap();

        assert_eq!(emails(&rows), vec!["u2@x.com", "u3@x.com"]);
    }

    #[test]
    fn test_missing_cursor_row_yields_empty() {
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        let args = FindManyArgs::new()
            .order_by(OrderBy::asc("email"))
            .cursor(vec![("email".to_string(), Value::from("zz@x.com"))]);
        assert!(executor.find_many("User", &args).unwrap().is_empty());
    }

    #[test]
    fn test_negative_take_without_cursor_returns_tail() {
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        let args = FindManyArgs::new().order_by(OrderBy::asc("email")).take(-2);
        let rows = executor.find_many("User", &args).unwrap();
        assert_eq!(emails(&rows), vec!["u3@x.com", "u4@x.com"]);
    }

    #[test]
    fn test_distinct_keeps_first_per_key() {
        // GIVEN: three sessions over two origins
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        // WHEN
        let args = FindManyArgs::new()
            .order_by(OrderBy::asc("origin"))
            .distinct(&["origin"]);
        let rows = executor.find_many("ServerSession", &args).unwrap();

        // THEN: one row per origin
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_include_loads_children_with_nested_args() {
        // GIVEN
        let (registry, store, ids) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        // WHEN: users with their sessions, children ordered by origin desc
        let args = FindManyArgs::new()
            .order_by(OrderBy::asc("email"))
            .selection(Selection::default().include(
                "sessions",
                FindManyArgs::new().order_by(OrderBy::desc("origin")),
            ));
        let rows = executor.find_many("User", &args).unwrap();

        // THEN
        let u0 = rows.iter().find(|r| r.record.id() == Some(ids[0])).unwrap();
        let origins: Vec<_> = u0
            .many("sessions")
            .iter()
            .map(|s| s.record.get("origin").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(origins, vec!["https://b.example", "https://a.example"]);

        let u4 = rows.iter().find(|r| r.record.id() == Some(ids[4])).unwrap();
        assert!(u4.many("sessions").is_empty());
    }

    #[test]
    fn test_nested_include_distributes_grandchildren_to_their_parents() {
        // GIVEN: every session gets its own pair of timelines
        let (registry, mut store, ids) = fixture();
        let session_ids: Vec<Uuid> = store
            .table("ServerSession")
            .unwrap()
            .scan()
            .filter_map(Record::id)
            .collect();
        for session_id in &session_ids {
            for timeline_type in ["HOME", "LOCAL"] {
                let mut timeline = Record::new();
                timeline.set("id", Uuid::new_v4());
                timeline.set("server_session_id", *session_id);
                timeline.set("timeline_type", timeline_type);
                store.table_mut("Timeline").unwrap().insert(timeline).unwrap();
            }
        }
        let executor = QueryExecutor::new(&registry, &store);

        // WHEN: users -> sessions -> timelines in one include tree
        let args = FindManyArgs::new().selection(Selection::default().include(
            "sessions",
            FindManyArgs::new().selection(
                Selection::default().include("timelines", FindManyArgs::new()),
            ),
        ));
        let rows = executor.find_many("User", &args).unwrap();

        // THEN: each session row carries exactly its own timelines
        let u0 = rows.iter().find(|r| r.record.id() == Some(ids[0])).unwrap();
        assert_eq!(u0.many("sessions").len(), 2);
        for session in u0.many("sessions") {
            let timelines = session.many("timelines");
            assert_eq!(timelines.len(), 2);
            for timeline in timelines {
                assert_eq!(
                    timeline.record.get_or_null("server_session_id").as_uuid(),
                    session.record.id()
                );
            }
        }

        let u4 = rows.iter().find(|r| r.record.id() == Some(ids[4])).unwrap();
        assert!(u4.many("sessions").is_empty());
    }

    #[test]
    fn test_include_belongs_to() {
        let (registry, store, ids) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        let args = FindManyArgs::new()
            .selection(Selection::default().include("user", FindManyArgs::new()));
        let rows = executor.find_many("ServerSession", &args).unwrap();

        assert_eq!(rows.len(), 3);
        let parent = rows[0].one("user").unwrap();
        assert!(ids.contains(&parent.record.id().unwrap()));
    }

    #[test]
    fn test_select_projection() {
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        let args = FindManyArgs::new().selection(Selection::select(&["email"]));
        let rows = executor.find_many("User", &args).unwrap();

        for row in &rows {
            assert!(row.record.contains("email"));
            assert!(!row.record.contains("id"));
            assert!(!row.record.contains("role"));
        }

        // Unknown projected field is rejected up front
        let bad = FindManyArgs::new().selection(Selection::select(&["nope"]));
        assert!(executor.find_many("User", &bad).is_err());
    }

    #[test]
    fn test_find_first_respects_order_and_filter() {
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        let args = FindManyArgs::new()
            .filter(Filter::not(Filter::equals("email", "u0@x.com")))
            .order_by(OrderBy::asc("email"));
        let row = executor.find_first("User", &args).unwrap().unwrap();
        assert_eq!(row.record.get("email").unwrap().as_str(), Some("u1@x.com"));

        let none = FindManyArgs::new().filter(Filter::equals("email", "zz@x.com"));
        assert!(executor.find_first("User", &none).unwrap().is_none());
        assert!(matches!(
            executor.find_first_or_throw("User", &none),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_order_by_unknown_field_rejected() {
        let (registry, store, _) = fixture();
        let executor = QueryExecutor::new(&registry, &store);

        let args = FindManyArgs::new().order_by(OrderBy::asc("nope"));
        assert!(matches!(
            executor.find_many("User", &args),
            Err(StoreError::Validation { .. })
        ));
    }
}
