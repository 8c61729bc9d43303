//! SQL emitter: compiles a filter into a predicate over a JSONB `metadata`
//! column, suitable for appending to a pgvector similarity query.
//!
//! Every literal value becomes a numbered bind parameter (`$N`); values are
//! never interpolated into the SQL text, so a string literal containing
//! quotes or backslashes cannot break out of the fragment. The caller decides
//! where parameter numbering starts (e.g. pass `3` when `$1`/`$2` are already
//! taken by the query vector and the limit).

use crate::expr::{CompareOp, Filter, FilterExpr, FilterValue};

/// A value to bind against one `$N` placeholder in a compiled clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBind {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// A compiled SQL predicate: the clause text and its bind values, in
/// placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    /// Predicate fragment, e.g. `(metadata->>'author' = $3)`.
    pub clause: String,
    /// Values for the placeholders, starting at the requested first index.
    pub binds: Vec<SqlBind>,
}

impl SqlFilter {
    /// The predicate that restricts nothing.
    pub fn unrestricted() -> Self {
        SqlFilter {
            clause: "TRUE".to_string(),
            binds: Vec::new(),
        }
    }
}

impl Filter {
    /// Compile to a SQL predicate. The empty filter compiles to `TRUE`.
    pub fn to_sql(&self, first_param: usize) -> SqlFilter {
        match self.expr() {
            Some(expr) => expr.to_sql(first_param),
            None => SqlFilter::unrestricted(),
        }
    }
}

impl FilterExpr {
    /// Compile this expression to a SQL predicate with placeholders starting
    /// at `$first_param`. Never fails.
    pub fn to_sql(&self, first_param: usize) -> SqlFilter {
        let mut emitter = Emitter {
            next_param: first_param,
            binds: Vec::new(),
        };
        let clause = emitter.emit(self);
        SqlFilter {
            clause,
            binds: emitter.binds,
        }
    }
}

struct Emitter {
    next_param: usize,
    binds: Vec<SqlBind>,
}

impl Emitter {
    fn emit(&mut self, expr: &FilterExpr) -> String {
        match expr {
            FilterExpr::Compare { field, op, value } => self.comparison(field, *op, value),
            FilterExpr::In { field, values } => self.membership(field, values),
            FilterExpr::NotIn { field, values } => {
                format!("NOT {}", self.membership(field, values))
            }
            FilterExpr::And(children) => self.logical(children, " AND "),
            FilterExpr::Or(children) => self.logical(children, " OR "),
            FilterExpr::Not(inner) => format!("NOT ({})", self.emit(inner)),
        }
    }

    fn logical(&mut self, children: &[FilterExpr], joiner: &str) -> String {
        let clauses: Vec<String> = children.iter().map(|c| self.emit(c)).collect();
        format!("({})", clauses.join(joiner))
    }

    fn comparison(&mut self, field: &str, op: CompareOp, value: &FilterValue) -> String {
        let op = match op {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        };
        let column = column_for(field, value);
        let placeholder = self.bind(value);
        format!("{column} {op} {placeholder}")
    }

    /// IN compiles to an OR of equalities so that each element can carry its
    /// own column cast; a one-element list collapses to a plain equality.
    fn membership(&mut self, field: &str, values: &[FilterValue]) -> String {
        let clauses: Vec<String> = values
            .iter()
            .map(|value| {
                let column = column_for(field, value);
                let placeholder = self.bind(value);
                format!("{column} = {placeholder}")
            })
            .collect();
        if clauses.len() == 1 {
            format!("({})", clauses[0])
        } else {
            format!("({})", clauses.join(" OR "))
        }
    }

    fn bind(&mut self, value: &FilterValue) -> String {
        self.binds.push(match value {
            FilterValue::String(s) => SqlBind::Text(s.clone()),
            FilterValue::Int(i) => SqlBind::Int(*i),
            FilterValue::Float(f) => SqlBind::Float(*f),
            FilterValue::Bool(b) => SqlBind::Bool(*b),
        });
        let placeholder = format!("${}", self.next_param);
        self.next_param += 1;
        placeholder
    }
}

/// The JSONB path expression for a field, cast to match the literal's type.
/// The field name is quote-escaped since it is interpolated into the path
/// literal; values themselves always go through bind parameters.
fn column_for(field: &str, value: &FilterValue) -> String {
    let field = field.replace('\'', "''");
    match value {
        FilterValue::String(_) => format!("metadata->>'{field}'"),
        FilterValue::Int(_) | FilterValue::Float(_) => {
            format!("(metadata->>'{field}')::numeric")
        }
        FilterValue::Bool(_) => format!("(metadata->>'{field}')::boolean"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_is_unrestricted() {
        let sql = Filter::none().to_sql(1);
        assert_eq!(sql.clause, "TRUE");
        assert!(sql.binds.is_empty());
    }

    #[test]
    fn string_equality_binds_value() {
        let sql = FilterExpr::eq("author", "john").to_sql(1);
        assert_eq!(sql.clause, "metadata->>'author' = $1");
        assert_eq!(sql.binds, vec![SqlBind::Text("john".into())]);
    }

    #[test]
    fn numeric_comparison_casts_column() {
        let sql = FilterExpr::gte("year", 2020).to_sql(1);
        assert_eq!(sql.clause, "(metadata->>'year')::numeric >= $1");
        assert_eq!(sql.binds, vec![SqlBind::Int(2020)]);

        let sql = FilterExpr::lt("score", 0.5).to_sql(1);
        assert_eq!(sql.clause, "(metadata->>'score')::numeric < $1");
        assert_eq!(sql.binds, vec![SqlBind::Float(0.5)]);
    }

    #[test]
    fn boolean_comparison_casts_column() {
        let sql = FilterExpr::eq("published", true).to_sql(1);
        assert_eq!(sql.clause, "(metadata->>'published')::boolean = $1");
        assert_eq!(sql.binds, vec![SqlBind::Bool(true)]);
    }

    #[test]
    fn parameter_numbering_starts_where_asked() {
        let sql = FilterExpr::eq("a", 1).and(FilterExpr::eq("b", 2)).to_sql(3);
        assert_eq!(
            sql.clause,
            "((metadata->>'a')::numeric = $3 AND (metadata->>'b')::numeric = $4)"
        );
        assert_eq!(sql.binds, vec![SqlBind::Int(1), SqlBind::Int(2)]);
    }

    #[test]
    fn in_compiles_to_or_of_equalities() {
        let sql = FilterExpr::is_in("author", ["john", "jill"]).unwrap().to_sql(1);
        assert_eq!(
            sql.clause,
            "(metadata->>'author' = $1 OR metadata->>'author' = $2)"
        );
        assert_eq!(
            sql.binds,
            vec![SqlBind::Text("john".into()), SqlBind::Text("jill".into())]
        );
    }

    #[test]
    fn not_in_negates_membership() {
        let sql = FilterExpr::not_in("year", [2019, 2020]).unwrap().to_sql(1);
        assert_eq!(
            sql.clause,
            "NOT ((metadata->>'year')::numeric = $1 OR (metadata->>'year')::numeric = $2)"
        );
    }

    #[test]
    fn negation_wraps_in_not() {
        let sql = FilterExpr::eq("author", "john").negate().to_sql(1);
        assert_eq!(sql.clause, "NOT (metadata->>'author' = $1)");
    }

    #[test]
    fn nested_logic_parenthesizes() {
        let expr = FilterExpr::eq("a", 1)
            .or(FilterExpr::eq("b", 2).and(FilterExpr::eq("c", 3)));
        let sql = expr.to_sql(1);
        assert_eq!(
            sql.clause,
            "((metadata->>'a')::numeric = $1 OR ((metadata->>'b')::numeric = $2 AND (metadata->>'c')::numeric = $3))"
        );
        assert_eq!(sql.binds.len(), 3);
    }

    #[test]
    fn quotes_and_backslashes_stay_in_binds() {
        // Syntax-breakout attempt: the value never reaches the SQL text.
        let hostile = "john'; DROP TABLE documents; --";
        let sql = FilterExpr::eq("author", hostile).to_sql(1);
        assert_eq!(sql.clause, "metadata->>'author' = $1");
        assert!(!sql.clause.contains("DROP"));
        assert_eq!(sql.binds, vec![SqlBind::Text(hostile.into())]);

        let sql = FilterExpr::eq("path", r"a\'b").to_sql(1);
        assert_eq!(sql.clause, "metadata->>'path' = $1");
    }

    #[test]
    fn quoted_field_name_is_escaped() {
        let sql = FilterExpr::eq("bad'field", "x").to_sql(1);
        assert_eq!(sql.clause, "metadata->>'bad''field' = $1");
    }

    #[test]
    fn parsed_filter_compiles() {
        let filter = Filter::parse("author in ['john','jill'] && article_type == 'blog'").unwrap();
        let sql = filter.to_sql(3);
        assert_eq!(
            sql.clause,
            "((metadata->>'author' = $3 OR metadata->>'author' = $4) AND metadata->>'article_type' = $5)"
        );
        assert_eq!(sql.binds.len(), 3);
    }
}
