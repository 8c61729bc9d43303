//! MongoDB emitter: compiles a filter into the nested boolean/comparison
//! document understood by `$vectorSearch` pre-filtering (and by ordinary
//! `find` queries). Metadata fields are addressed as `metadata.<field>`.

use serde_json::{Map, Value};

use crate::expr::{CompareOp, Filter, FilterExpr};

impl Filter {
    /// Compile to a document filter. The empty filter compiles to `None`,
    /// meaning no `filter` clause should be attached to the query at all.
    pub fn to_mongo(&self) -> Option<Value> {
        self.expr().map(FilterExpr::to_mongo)
    }
}

impl FilterExpr {
    /// Compile this expression to a document filter. Never fails.
    pub fn to_mongo(&self) -> Value {
        match self {
            FilterExpr::Compare { field, op, value } => {
                let path = metadata_path(field);
                let value = Value::from(value);
                match op {
                    // Plain `{field: value}` is Mongo's idiomatic equality.
                    CompareOp::Eq => doc(path, value),
                    CompareOp::Ne => doc(path, doc("$ne".into(), value)),
                    CompareOp::Gt => doc(path, doc("$gt".into(), value)),
                    CompareOp::Gte => doc(path, doc("$gte".into(), value)),
                    CompareOp::Lt => doc(path, doc("$lt".into(), value)),
                    CompareOp::Lte => doc(path, doc("$lte".into(), value)),
                }
            }
            FilterExpr::In { field, values } => {
                let path = metadata_path(field);
                if values.len() == 1 {
                    doc(path, Value::from(&values[0]))
                } else {
                    let clauses: Vec<Value> = values
                        .iter()
                        .map(|v| doc(path.clone(), Value::from(v)))
                        .collect();
                    doc("$or".into(), Value::Array(clauses))
                }
            }
            FilterExpr::NotIn { field, values } => {
                let values: Vec<Value> = values.iter().map(Value::from).collect();
                doc(
                    metadata_path(field),
                    doc("$nin".into(), Value::Array(values)),
                )
            }
            FilterExpr::And(children) => {
                let clauses: Vec<Value> = children.iter().map(FilterExpr::to_mongo).collect();
                doc("$and".into(), Value::Array(clauses))
            }
            FilterExpr::Or(children) => {
                let clauses: Vec<Value> = children.iter().map(FilterExpr::to_mongo).collect();
                doc("$or".into(), Value::Array(clauses))
            }
            FilterExpr::Not(inner) => doc("$nor".into(), Value::Array(vec![inner.to_mongo()])),
        }
    }
}

/// A single-key JSON object.
fn doc(key: String, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}

fn metadata_path(field: &str) -> String {
    format!("metadata.{field}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_has_no_document() {
        assert_eq!(Filter::none().to_mongo(), None);
    }

    #[test]
    fn equality_is_plain_field_value() {
        assert_eq!(
            FilterExpr::eq("author", "john").to_mongo(),
            json!({ "metadata.author": "john" })
        );
    }

    #[test]
    fn comparison_operators_map_to_dollar_ops() {
        assert_eq!(
            FilterExpr::ne("author", "john").to_mongo(),
            json!({ "metadata.author": { "$ne": "john" } })
        );
        assert_eq!(
            FilterExpr::gt("year", 2020).to_mongo(),
            json!({ "metadata.year": { "$gt": 2020 } })
        );
        assert_eq!(
            FilterExpr::lte("score", 0.5).to_mongo(),
            json!({ "metadata.score": { "$lte": 0.5 } })
        );
    }

    #[test]
    fn in_compiles_to_or_of_equalities() {
        assert_eq!(
            FilterExpr::is_in("author", ["john", "jill"]).unwrap().to_mongo(),
            json!({ "$or": [
                { "metadata.author": "john" },
                { "metadata.author": "jill" },
            ]})
        );
    }

    #[test]
    fn single_element_in_collapses_to_equality() {
        assert_eq!(
            FilterExpr::is_in("author", ["john"]).unwrap().to_mongo(),
            json!({ "metadata.author": "john" })
        );
    }

    #[test]
    fn not_in_uses_nin() {
        assert_eq!(
            FilterExpr::not_in("year", [2019, 2020]).unwrap().to_mongo(),
            json!({ "metadata.year": { "$nin": [2019, 2020] } })
        );
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            FilterExpr::eq("author", "john").negate().to_mongo(),
            json!({ "$nor": [{ "metadata.author": "john" }] })
        );
    }

    #[test]
    fn round_trip_from_dsl() {
        let filter = Filter::parse("author in ['john','jill'] && article_type == 'blog'").unwrap();
        let expected: Value = serde_json::from_str(
            r#"{"$and":[{"$or":[{"metadata.author":"john"},{"metadata.author":"jill"}]},{"metadata.article_type":"blog"}]}"#,
        )
        .unwrap();
        assert_eq!(filter.to_mongo(), Some(expected));
    }

    #[test]
    fn precedence_example_compiles() {
        let filter = Filter::parse("a == 1 || b == 2 && c == 3").unwrap();
        assert_eq!(
            filter.to_mongo(),
            Some(json!({ "$or": [
                { "metadata.a": 1 },
                { "$and": [{ "metadata.b": 2 }, { "metadata.c": 3 }] },
            ]}))
        );
    }
}
