//! Aggregate execution.

use crate::args::{AggregateResult, AggregateSelect, GroupByArgs, GroupRow};
use deckdb_core::{Record, StoreError, StoreResult, Value};
use deckdb_filter::{Filter, FilterEvaluator};
use deckdb_query::{NullsOrder, OrderBy, SortOrder};
use deckdb_schema::{EntityDef, SchemaRegistry};
use deckdb_store::Store;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Read-only aggregation over the store.
pub struct AggregateEngine<'a> {
    registry: &'a SchemaRegistry,
    store: &'a Store,
    evaluator: FilterEvaluator<'a>,
}

impl<'a> AggregateEngine<'a> {
    /// Create a new engine.
    pub fn new(registry: &'a SchemaRegistry, store: &'a Store) -> Self {
        Self {
            registry,
            store,
            evaluator: FilterEvaluator::new(registry, store),
        }
    }

    /// Number of rows matching the filter.
    pub fn count(&self, entity: &str, filter: Option<&Filter>) -> StoreResult<usize> {
        let def = self.entity(entity)?;
        Ok(self.filtered_rows(def, filter)?.len())
    }

    /// Aggregates over the rows matching the filter.
    pub fn aggregate(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        selects: &[AggregateSelect],
    ) -> StoreResult<AggregateResult> {
        let def = self.entity(entity)?;
        self.check_select_fields(def, selects)?;
        let rows = self.filtered_rows(def, filter)?;
        Ok(compute(&rows, selects))
    }

    /// Grouped aggregation. All argument validation happens before any row
    /// is read, so malformed arguments fail the same way on an empty store.
    pub fn group_by(&self, entity: &str, args: &GroupByArgs) -> StoreResult<Vec<GroupRow>> {
        let def = self.entity(entity)?;
        self.validate_group_args(def, args)?;

        let rows = self.filtered_rows(def, args.filter.as_ref())?;

        // Group rows, keeping first-seen key order.
        let mut key_order: Vec<Vec<Value>> = Vec::new();
        let mut groups: HashMap<Vec<Value>, Vec<&Record>> = HashMap::new();
        for row in rows {
            let key: Vec<Value> = args.by.iter().map(|f| row.get_or_null(f)).collect();
            if !groups.contains_key(&key) {
                key_order.push(key.clone());
            }
            groups.entry(key).or_default().push(row);
        }

        let mut out = Vec::with_capacity(key_order.len());
        for key in key_order {
            let members = &groups[&key];
            let mut record = Record::new();
            for (field, value) in args.by.iter().zip(key) {
                record.set(field.clone(), value);
            }
            if let Some(having) = &args.having {
                if !self.evaluator.matches(&def.name, &record, having)? {
                    continue;
                }
            }
            out.push(GroupRow {
                key: record,
                aggregates: compute(members, &args.aggregates),
            });
        }

        sort_groups(&mut out, &args.order);
        Ok(paginate_groups(out, args))
    }

    fn entity(&self, name: &str) -> StoreResult<&'a EntityDef> {
        self.registry
            .entity(name)
            .ok_or_else(|| StoreError::validation(format!("unknown entity: {}", name)))
    }

    fn filtered_rows(
        &self,
        entity: &EntityDef,
        filter: Option<&Filter>,
    ) -> StoreResult<Vec<&'a Record>> {
        if let Some(filter) = filter {
            self.evaluator.validate(&entity.name, filter)?;
        }
        let mut rows = Vec::new();
        for record in self.store.table(&entity.name)?.scan() {
            let keep = match filter {
                Some(filter) => self.evaluator.matches(&entity.name, record, filter)?,
                None => true,
            };
            if keep {
                rows.push(record);
            }
        }
        Ok(rows)
    }

    fn check_select_fields(
        &self,
        entity: &EntityDef,
        selects: &[AggregateSelect],
    ) -> StoreResult<()> {
        for select in selects {
            if let Some(field) = select.field() {
                if !entity.has_field(field) {
                    return Err(StoreError::validation(format!(
                        "cannot aggregate unknown field {}.{}",
                        entity.name, field
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_group_args(&self, entity: &EntityDef, args: &GroupByArgs) -> StoreResult<()> {
        if args.by.is_empty() {
            return Err(StoreError::validation("groupBy requires at least one key field"));
        }
        for field in &args.by {
            if !entity.has_field(field) {
                return Err(StoreError::validation(format!(
                    "cannot group by unknown field {}.{}",
                    entity.name, field
                )));
            }
        }
        self.check_select_fields(entity, &args.aggregates)?;

        let by: HashSet<&str> = args.by.iter().map(String::as_str).collect();
        if let Some(having) = &args.having {
            check_having(having, &by)?;
        }
        for order in &args.order {
            if !by.contains(order.field.as_str()) {
                return Err(StoreError::validation(format!(
                    "groupBy ordering field {} is not in the grouping key",
                    order.field
                )));
            }
        }
        if (args.take.is_some() || args.skip > 0) && args.order.is_empty() {
            return Err(StoreError::validation(
                "groupBy pagination requires an ordering",
            ));
        }
        if let Some(filter) = &args.filter {
            self.evaluator.validate(&entity.name, filter)?;
        }
        Ok(())
    }
}

/// A having filter may only touch the grouping key.
fn check_having(filter: &Filter, by: &HashSet<&str>) -> StoreResult<()> {
    match filter {
        Filter::And(items) | Filter::Or(items) => {
            for item in items {
                check_having(item, by)?;
            }
            Ok(())
        }
        Filter::Not(inner) => check_having(inner, by),
        Filter::Field { field, .. } => {
            if by.contains(field.as_str()) {
                Ok(())
            } else {
                Err(StoreError::validation(format!(
                    "having references {} outside the grouping key",
                    field
                )))
            }
        }
        Filter::Relation { relation, .. } => Err(StoreError::validation(format!(
            "having cannot reference relation {}",
            relation
        ))),
    }
}

fn compute(rows: &[&Record], selects: &[AggregateSelect]) -> AggregateResult {
    let mut out = AggregateResult::default();
    for select in selects {
        match select {
            AggregateSelect::Count => {
                out.count = Some(rows.len());
            }
            AggregateSelect::CountField(field) => {
                let n = rows
                    .iter()
                    .filter(|row| !row.get_or_null(field).is_null())
                    .count();
                out.field_counts.insert(field.clone(), n);
            }
            AggregateSelect::Min(field) => {
                out.min.insert(field.clone(), extreme(rows, field, Ordering::Less));
            }
            AggregateSelect::Max(field) => {
                out.max
                    .insert(field.clone(), extreme(rows, field, Ordering::Greater));
            }
        }
    }
    out
}

/// Min or max over the non-null values of a field; Null when there are none.
fn extreme(rows: &[&Record], field: &str, want: Ordering) -> Value {
    let mut best: Option<Value> = None;
    for row in rows {
        let value = row.get_or_null(field);
        if value.is_null() {
            continue;
        }
        best = Some(match best {
            Some(current) if value.cmp_sortable(&current) != want => current,
            _ => value,
        });
    }
    best.unwrap_or(Value::Null)
}

fn sort_groups(groups: &mut [GroupRow], order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }
    groups.sort_by(|a, b| {
        for key in order {
            let av = a.key.get_or_null(&key.field);
            let bv = b.key.get_or_null(&key.field);
            let ord = match (av.is_null(), bv.is_null()) {
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
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Skip/take over ordered groups; a negative take keeps the tail.
fn paginate_groups(mut groups: Vec<GroupRow>, args: &GroupByArgs) -> Vec<GroupRow> {
    let backward = args.take.is_some_and(|take| take < 0);
    let limit = args.take.map(|take| take.unsigned_abs() as usize);

    if backward {
        groups.reverse();
    }
    let iter = groups.into_iter().skip(args.skip);
    let mut out: Vec<GroupRow> = match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    };
    if backward {
        out.reverse();
    }
    out
}
