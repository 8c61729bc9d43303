use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while constructing or parsing a filter expression.
///
/// Compiling a structurally valid expression to a backend fragment never
/// fails; only parsing and construction can.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Malformed filter text. Reports the byte offset of the offending token,
    /// the set of tokens that would have been accepted, and what was found.
    #[error("parse error at byte {offset}: expected {expected}, found {found}")]
    Parse {
        offset: usize,
        expected: String,
        found: String,
    },
    /// `in` / `nin` require at least one value.
    #[error("'in' and 'nin' require a non-empty value list")]
    EmptyValueList,
}

// ---------------------------------------------------------------------------
// FilterValue
// ---------------------------------------------------------------------------

/// A literal value in a filter comparison: string, number, or boolean.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(i: i64) -> Self {
        FilterValue::Int(i)
    }
}

impl From<i32> for FilterValue {
    fn from(i: i32) -> Self {
        FilterValue::Int(i as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(f: f64) -> Self {
        FilterValue::Float(f)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

impl From<&FilterValue> for Value {
    fn from(v: &FilterValue) -> Self {
        match v {
            FilterValue::String(s) => Value::String(s.clone()),
            FilterValue::Int(i) => Value::Number((*i).into()),
            FilterValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FilterValue::Bool(b) => Value::Bool(*b),
        }
    }
}

// ---------------------------------------------------------------------------
// Operators and expressions
// ---------------------------------------------------------------------------

/// Scalar comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A filter expression tree over metadata fields.
///
/// Field names reference metadata keys opaquely; the compiler does not check
/// that a field exists in any schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `field <op> value`, e.g. `year >= 2020`.
    Compare {
        field: String,
        op: CompareOp,
        value: FilterValue,
    },
    /// `field in [v1, v2, ...]`. The value list is never empty.
    In {
        field: String,
        values: Vec<FilterValue>,
    },
    /// `field nin [v1, v2, ...]`. The value list is never empty.
    NotIn {
        field: String,
        values: Vec<FilterValue>,
    },
    /// Conjunction of two or more sub-expressions.
    And(Vec<FilterExpr>),
    /// Disjunction of two or more sub-expressions.
    Or(Vec<FilterExpr>),
    /// Negation of a sub-expression.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<FilterValue>) -> Self {
        FilterExpr::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    /// `field in [values...]`.
    ///
    /// Returns [`FilterError::EmptyValueList`] if `values` is empty; an empty
    /// membership test has no defined match set and is rejected up front.
    pub fn is_in<V: Into<FilterValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, FilterError> {
        let values: Vec<FilterValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(FilterError::EmptyValueList);
        }
        Ok(FilterExpr::In {
            field: field.into(),
            values,
        })
    }

    /// `field nin [values...]`. Rejects an empty value list like [`is_in`](Self::is_in).
    pub fn not_in<V: Into<FilterValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, FilterError> {
        let values: Vec<FilterValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(FilterError::EmptyValueList);
        }
        Ok(FilterExpr::NotIn {
            field: field.into(),
            values,
        })
    }

    /// Conjoin with another expression. Adjacent conjunctions are flattened so
    /// that `a.and(b).and(c)` equals the tree parsed from `a && b && c`.
    pub fn and(self, other: FilterExpr) -> Self {
        match self {
            FilterExpr::And(mut children) => {
                children.push(other);
                FilterExpr::And(children)
            }
            first => FilterExpr::And(vec![first, other]),
        }
    }

    /// Disjoin with another expression, flattening like [`and`](Self::and).
    pub fn or(self, other: FilterExpr) -> Self {
        match self {
            FilterExpr::Or(mut children) => {
                children.push(other);
                FilterExpr::Or(children)
            }
            first => FilterExpr::Or(vec![first, other]),
        }
    }

    /// Negate this expression.
    pub fn negate(self) -> Self {
        FilterExpr::Not(Box::new(self))
    }

    /// Evaluate this expression against a document's metadata map.
    ///
    /// Types are not coerced: comparing a string literal to a numeric field
    /// (or referencing a missing field) matches nothing. Integer and float
    /// literals compare numerically with each other, and ordering comparisons
    /// fall back to lexicographic order for string pairs.
    pub fn evaluate(&self, metadata: &HashMap<String, Value>) -> bool {
        match self {
            FilterExpr::Compare { field, op, value } => match metadata.get(field) {
                Some(stored) => compare(stored, *op, value),
                None => false,
            },
            FilterExpr::In { field, values } => match metadata.get(field) {
                Some(stored) => values.iter().any(|v| compare(stored, CompareOp::Eq, v)),
                None => false,
            },
            FilterExpr::NotIn { field, values } => match metadata.get(field) {
                Some(stored) => !values.iter().any(|v| compare(stored, CompareOp::Eq, v)),
                None => false,
            },
            FilterExpr::And(children) => children.iter().all(|c| c.evaluate(metadata)),
            FilterExpr::Or(children) => children.iter().any(|c| c.evaluate(metadata)),
            FilterExpr::Not(inner) => !inner.evaluate(metadata),
        }
    }
}

fn compare(stored: &Value, op: CompareOp, literal: &FilterValue) -> bool {
    use std::cmp::Ordering;

    let ordering: Option<Ordering> = match (stored, literal) {
        (Value::String(s), FilterValue::String(l)) => Some(s.as_str().cmp(l.as_str())),
        (Value::Bool(s), FilterValue::Bool(l)) => {
            // Booleans support equality only.
            return match op {
                CompareOp::Eq => s == l,
                CompareOp::Ne => s != l,
                _ => false,
            };
        }
        (Value::Number(n), FilterValue::Int(l)) => {
            n.as_f64().and_then(|s| s.partial_cmp(&(*l as f64)))
        }
        (Value::Number(n), FilterValue::Float(l)) => n.as_f64().and_then(|s| s.partial_cmp(l)),
        _ => None,
    };

    match ordering {
        Some(ord) => match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
        },
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A possibly-empty filter attached to a similarity search.
///
/// The empty filter imposes no restriction: it compiles to `TRUE` on the SQL
/// backend and to "no filter" on the document backend, and
/// [`matches`](Filter::matches) returns `true` for every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    expr: Option<FilterExpr>,
}

impl Filter {
    /// The filter that matches every document.
    pub fn none() -> Self {
        Filter { expr: None }
    }

    /// Wrap an expression tree.
    pub fn new(expr: FilterExpr) -> Self {
        Filter { expr: Some(expr) }
    }

    /// Parse a filter from the text DSL. Empty (or whitespace-only) input
    /// yields the unrestrictive filter.
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        crate::parser::parse(input)
    }

    /// The underlying expression, if any.
    pub fn expr(&self) -> Option<&FilterExpr> {
        self.expr.as_ref()
    }

    pub fn is_none(&self) -> bool {
        self.expr.is_none()
    }

    /// Evaluate against a metadata map; the empty filter matches everything.
    pub fn matches(&self, metadata: &HashMap<String, Value>) -> bool {
        match &self.expr {
            Some(expr) => expr.evaluate(metadata),
            None => true,
        }
    }
}

impl From<FilterExpr> for Filter {
    fn from(expr: FilterExpr) -> Self {
        Filter::new(expr)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
