//! Query arguments.

use deckdb_core::Value;
use deckdb_filter::Filter;
use std::collections::BTreeMap;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Where null values are placed in an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// One ordering key. Multiple keys compose lexicographically in the order
/// given, over a stable sort, so ties fall back to insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortOrder,
    pub nulls: NullsOrder,
}

impl OrderBy {
    /// Ascending order with nulls last.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortOrder::Asc,
            nulls: NullsOrder::Last,
        }
    }

    /// Descending order with nulls first.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortOrder::Desc,
            nulls: NullsOrder::First,
        }
    }

    /// Override null placement.
    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = nulls;
        self
    }
}

/// A unique key given as (field, value) pairs, in any field order. Must
/// name exactly one of the entity's unique key sets.
pub type UniqueKey = Vec<(String, Value)>;

/// Field projection applied to each returned record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Every field (default).
    #[default]
    All,
    /// Only the named fields.
    Select(Vec<String>),
    /// Every field except the named ones.
    Omit(Vec<String>),
}

/// Result shaping shared by every read: projection plus the relation
/// include tree. Includes nest: each included relation carries its own
/// full argument set for its rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub projection: Projection,
    pub include: BTreeMap<String, FindManyArgs>,
}

impl Selection {
    /// Keep only the named fields.
    pub fn select(fields: &[&str]) -> Self {
        Self {
            projection: Projection::Select(fields.iter().map(|f| f.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Drop the named fields.
    pub fn omit(fields: &[&str]) -> Self {
        Self {
            projection: Projection::Omit(fields.iter().map(|f| f.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Add an included relation.
    pub fn include(mut self, relation: impl Into<String>, args: FindManyArgs) -> Self {
        self.include.insert(relation.into(), args);
        self
    }

    /// Whether this selection changes the default shape at all.
    pub fn is_default(&self) -> bool {
        self.projection == Projection::All && self.include.is_empty()
    }
}

/// Arguments to a list query.
///
/// A negative `take` paginates backward: the result is the last `|take|`
/// rows of the ordered window instead of the first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindManyArgs {
    pub filter: Option<Filter>,
    pub order: Vec<OrderBy>,
    pub cursor: Option<UniqueKey>,
    pub take: Option<i64>,
    pub skip: usize,
    pub distinct: Vec<String>,
    pub selection: Selection,
}

impl FindManyArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn cursor(mut self, key: UniqueKey) -> Self {
        self.cursor = Some(key);
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

    pub fn distinct(mut self, fields: &[&str]) -> Self {
        self.distinct = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_defaults() {
        let asc = OrderBy::asc("name");
        assert_eq!(asc.direction, SortOrder::Asc);
        assert_eq!(asc.nulls, NullsOrder::Last);

        let desc = OrderBy::desc("name").nulls(NullsOrder::Last);
        assert_eq!(desc.direction, SortOrder::Desc);
        assert_eq!(desc.nulls, NullsOrder::Last);
    }

    #[test]
    fn test_builder_accumulates() {
        let args = FindManyArgs::new()
            .filter(Filter::is_null("name"))
            .order_by(OrderBy::asc("created_at"))
            .take(-5)
            .skip(1)
            .distinct(&["role"]);

        assert!(args.filter.is_some());
        assert_eq!(args.order.len(), 1);
        assert_eq!(args.take, Some(-5));
        assert_eq!(args.skip, 1);
        assert_eq!(args.distinct, vec!["role".to_string()]);
        assert!(args.selection.is_default());
    }
}
