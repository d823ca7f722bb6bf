//! Query results.

use deckdb_core::Record;
use std::collections::BTreeMap;

/// One result row: the projected record plus any included relations.
///
/// Related rows are keyed by relation name. To-one relations carry zero or
/// one entry; to-many relations carry the matching rows in query order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub record: Record,
    pub related: BTreeMap<String, Vec<QueryRow>>,
}

impl QueryRow {
    /// A bare row with no included relations.
    pub fn bare(record: Record) -> Self {
        Self {
            record,
            related: BTreeMap::new(),
        }
    }

    /// Rows of an included to-many relation. Empty when the relation was
    /// not included.
    pub fn many(&self, relation: &str) -> &[QueryRow] {
        self.related.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The row of an included to-one relation, if included and present.
    pub fn one(&self, relation: &str) -> Option<&QueryRow> {
        self.related.get(relation).and_then(|rows| rows.first())
    }
}
