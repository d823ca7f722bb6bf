//! Aggregation arguments and results.

use deckdb_core::{Record, Value};
use deckdb_filter::Filter;
use deckdb_query::OrderBy;
use std::collections::BTreeMap;

/// One requested aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateSelect {
    /// Number of rows (or rows per group).
    Count,
    /// Number of rows with a non-null value in the field.
    CountField(String),
    /// Smallest non-null value of the field, by sort order.
    Min(String),
    /// Largest non-null value of the field, by sort order.
    Max(String),
}

impl AggregateSelect {
    /// The field this aggregate reads, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            AggregateSelect::Count => None,
            AggregateSelect::CountField(field)
            | AggregateSelect::Min(field)
            | AggregateSelect::Max(field) => Some(field),
        }
    }
}

/// Aggregates computed over one row set.
///
/// `min`/`max` hold `Value::Null` for fields with no non-null values,
/// mirroring SQL aggregate semantics over empty or all-null columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateResult {
    pub count: Option<usize>,
    pub field_counts: BTreeMap<String, usize>,
    pub min: BTreeMap<String, Value>,
    pub max: BTreeMap<String, Value>,
}

/// Arguments to a grouped aggregation.
#[derive(Debug, Clone, Default)]
pub struct GroupByArgs {
    /// Grouping key fields. Must be non-empty.
    pub by: Vec<String>,
    /// Row filter applied before grouping.
    pub filter: Option<Filter>,
    /// Group filter over the key fields only.
    pub having: Option<Filter>,
    /// Group ordering; every ordering field must be in `by`.
    pub order: Vec<OrderBy>,
    /// Group pagination; requires a non-empty `order`.
    pub take: Option<i64>,
    pub skip: usize,
    /// Aggregates computed per group.
    pub aggregates: Vec<AggregateSelect>,
}

impl GroupByArgs {
    pub fn by(fields: &[&str]) -> Self {
        Self {
            by: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn having(mut self, having: Filter) -> Self {
        self.having = Some(having);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn aggregate(mut self, select: AggregateSelect) -> Self {
        self.aggregates.push(select);
        self
    }
}

/// One group: its key values plus the aggregates computed over it.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    /// The grouping key as a record over the `by` fields.
    pub key: Record,
    pub aggregates: AggregateResult,
}
