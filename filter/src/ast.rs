//! Filter expression AST.
//!
//! Filters are an explicit sum type so the evaluator can pattern-match
//! exhaustively. Leaves compare one field or quantify over one relation;
//! combinators compose sub-filters. An empty `And` is vacuously true, an
//! empty `Or` vacuously false.

use deckdb_core::Value;

/// Case handling for string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringMode {
    /// Exact case (default).
    #[default]
    Sensitive,
    /// Case-insensitive comparison.
    Insensitive,
}

/// Comparison applied to a single field.
///
/// Null is never a comparison operand: testing for null goes through the
/// dedicated `IsNull` path, and the evaluator rejects null operands in the
/// other variants as validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Field equals the value.
    Equals(Value),
    /// Field is one of the values.
    In(Vec<Value>),
    /// Field is none of the values.
    NotIn(Vec<Value>),
    /// Field is strictly less than the value.
    Lt(Value),
    /// Field is less than or equal to the value.
    Lte(Value),
    /// Field is strictly greater than the value.
    Gt(Value),
    /// Field is greater than or equal to the value.
    Gte(Value),
    /// String field contains the substring.
    Contains(String, StringMode),
    /// String field starts with the prefix.
    StartsWith(String, StringMode),
    /// String field ends with the suffix.
    EndsWith(String, StringMode),
    /// Dedicated null test: true tests for null, false for non-null.
    IsNull(bool),
}

/// Quantifier or test applied to a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationOp {
    /// At least one related row matches (to-many).
    Some(Box<Filter>),
    /// All related rows match; vacuously true when empty (to-many).
    Every(Box<Filter>),
    /// No related row matches (to-many).
    None(Box<Filter>),
    /// The to-one relation matches the filter, or with `Option::None`,
    /// tests that the relation is null.
    Is(Option<Box<Filter>>),
    /// The to-one relation does not match, or with `Option::None`, tests
    /// that the relation is present.
    IsNot(Option<Box<Filter>>),
}

/// A filter expression tree over one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// All sub-filters hold. Empty list is vacuously true.
    And(Vec<Filter>),
    /// Any sub-filter holds. Empty list is vacuously false.
    Or(Vec<Filter>),
    /// The sub-filter does not hold.
    Not(Box<Filter>),
    /// Field comparison leaf.
    Field { field: String, op: FieldOp },
    /// Relation quantifier leaf.
    Relation { relation: String, op: RelationOp },
}

impl Filter {
    /// A filter that matches every row.
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    /// Field comparison leaf.
    pub fn field(name: impl Into<String>, op: FieldOp) -> Self {
        Filter::Field {
            field: name.into(),
            op,
        }
    }

    /// Equality leaf.
    pub fn equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(name, FieldOp::Equals(value.into()))
    }

    /// Null-test leaf.
    pub fn is_null(name: impl Into<String>) -> Self {
        Self::field(name, FieldOp::IsNull(true))
    }

    /// Relation quantifier leaf.
    pub fn relation(name: impl Into<String>, op: RelationOp) -> Self {
        Filter::Relation {
            relation: name.into(),
            op,
        }
    }

    /// Negation.
    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }
}
