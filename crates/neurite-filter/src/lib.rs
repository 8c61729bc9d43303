//! Portable metadata filter expressions for the Neurite vector stores.
//!
//! A [`Filter`] is a boolean/comparison expression over the metadata key/value
//! pairs attached to stored documents. It can be built in two equivalent ways:
//!
//! - parsed from a small text DSL:
//!
//!   ```rust
//!   use neurite_filter::Filter;
//!
//!   let filter = Filter::parse("author in ['john','jill'] && article_type == 'blog'")?;
//!   # Ok::<(), neurite_filter::FilterError>(())
//!   ```
//!
//! - composed programmatically:
//!
//!   ```rust
//!   use neurite_filter::FilterExpr;
//!
//!   let expr = FilterExpr::is_in("author", ["john", "jill"])?
//!       .and(FilterExpr::eq("article_type", "blog"));
//!   # Ok::<(), neurite_filter::FilterError>(())
//!   ```
//!
//! Both paths produce structurally identical trees. A filter is then compiled
//! into a backend-native fragment: a parameterized SQL predicate over a JSONB
//! `metadata` column ([`Filter::to_sql`]) or a MongoDB document filter
//! ([`Filter::to_mongo`]). Compilation is a pure function and never fails for
//! a structurally valid tree; only parsing can fail.
//!
//! The compiler does not validate field names against a schema, and it does
//! not coerce types: a filter literal whose type disagrees with the stored
//! value simply matches nothing at query time.

mod expr;
mod mongo;
mod parser;
mod sql;

pub use expr::{CompareOp, Filter, FilterError, FilterExpr, FilterValue};
pub use parser::parse;
pub use sql::{SqlBind, SqlFilter};
