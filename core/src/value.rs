//! Value types for DeckDB fields.
//!
//! Values are the atomic data stored in record fields. DeckDB supports
//! the scalar types used by the deck schema (String, Bool, Int, DateTime,
//! Uuid); enum fields are stored as their string representation and
//! validated against the schema registry on write.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// A value that can be stored in a record field.
///
/// There is no floating-point variant, so the type can be `Eq + Hash` and
/// serve directly as a unique-index key component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Null/missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer (aggregate counts, limits).
    Int(i64),
    /// UTF-8 string. Enum fields are stored as their variant name.
    String(String),
    /// UUID identifier (primary keys and foreign keys).
    Uuid(Uuid),
    /// UTC timestamp (createdAt/updatedAt and other datetime fields).
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as boolean if this is a Bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer if this is an Int value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as string reference if this is a String value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as UUID if this is a Uuid value.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    /// Get as timestamp if this is a DateTime value.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::String(_) => "String",
            Value::Uuid(_) => "Uuid",
            Value::DateTime(_) => "DateTime",
        }
    }

    /// Compare values for sorting. Null is treated as less than any other value;
    /// callers implementing explicit nulls-first/last placement must branch on
    /// `is_null` before falling back to this ordering.
    /// Values of different types return Equal (stable sort behavior).
    pub fn cmp_sortable(&self, other: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Uuid(id) => write!(f, "{}", id),
            Value::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::DateTime(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_accessors_match_variant() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Bool(true).as_int(), None);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_cmp_sortable_null_is_least() {
        // GIVEN
        let null = Value::Null;
        let s = Value::from("a");

        // THEN
        assert_eq!(null.cmp_sortable(&s), Ordering::Less);
        assert_eq!(s.cmp_sortable(&null), Ordering::Greater);
        assert_eq!(null.cmp_sortable(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn test_cmp_sortable_same_type() {
        assert_eq!(
            Value::from("a").cmp_sortable(&Value::from("b")),
            Ordering::Less
        );
        assert_eq!(Value::Int(3).cmp_sortable(&Value::Int(2)), Ordering::Greater);
    }

    #[test]
    fn test_cmp_sortable_mixed_types_stable() {
        assert_eq!(
            Value::from("a").cmp_sortable(&Value::Int(1)),
            Ordering::Equal
        );
    }
}
