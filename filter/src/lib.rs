//! DeckDB Filter Predicate Evaluator
//!
//! Declarative filter expressions as an explicit tagged AST (AND/OR/NOT
//! combinators, per-field comparisons, relation quantifiers) evaluated
//! against stored records with SQL three-valued logic: comparisons
//! involving null are unknown, and a row matches only when the whole tree
//! evaluates to true.
//!
//! Filters are validated against the schema registry at call time; unknown
//! fields or relations and ill-typed operands surface as validation errors,
//! never as silent mismatches.

mod ast;
mod eval;

pub use ast::{FieldOp, Filter, RelationOp, StringMode};
pub use eval::FilterEvaluator;
