//! End-to-end tests for the filter DSL: parse, compile to both backends, and
//! check agreement with in-process evaluation.

use std::collections::HashMap;

use neurite_filter::{Filter, FilterExpr, SqlBind};
use serde_json::{json, Value};

fn meta(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn dsl_and_builder_agree_on_structure() {
    let cases: Vec<(&str, FilterExpr)> = vec![
        ("author == 'john'", FilterExpr::eq("author", "john")),
        ("year >= 2020", FilterExpr::gte("year", 2020)),
        (
            "author in ['john','jill']",
            FilterExpr::is_in("author", ["john", "jill"]).unwrap(),
        ),
        (
            "year nin [2019, 2020]",
            FilterExpr::not_in("year", [2019, 2020]).unwrap(),
        ),
        (
            "a == 1 && b == 2 || c == 3",
            FilterExpr::eq("a", 1)
                .and(FilterExpr::eq("b", 2))
                .or(FilterExpr::eq("c", 3)),
        ),
        (
            "!(draft == true) && score > 0.5",
            FilterExpr::eq("draft", true)
                .negate()
                .and(FilterExpr::gt("score", 0.5)),
        ),
    ];

    for (text, built) in cases {
        let parsed = Filter::parse(text).unwrap();
        assert_eq!(parsed.expr(), Some(&built), "mismatch for {text:?}");
    }
}

#[test]
fn emission_never_fails_on_valid_trees() {
    // Both emitters are total functions over valid ASTs; exercising a mix of
    // shapes here just has to complete without panicking.
    let expressions = vec![
        FilterExpr::eq("a", "x"),
        FilterExpr::ne("a", 1),
        FilterExpr::lte("a", 1.5),
        FilterExpr::eq("a", false),
        FilterExpr::is_in("a", ["x", "y", "z"]).unwrap(),
        FilterExpr::not_in("a", [1, 2, 3]).unwrap(),
        FilterExpr::eq("a", 1).and(FilterExpr::eq("b", 2)),
        FilterExpr::eq("a", 1).or(FilterExpr::eq("b", 2)).negate(),
        FilterExpr::eq("it's", "tricky").and(FilterExpr::eq("b", r"\'")),
    ];

    for expr in expressions {
        let sql = expr.to_sql(1);
        assert!(!sql.clause.is_empty());
        let _ = expr.to_mongo();
    }
}

#[test]
fn round_trip_document_filter() {
    let filter = Filter::parse("author in ['john','jill'] && article_type == 'blog'").unwrap();
    assert_eq!(
        filter.to_mongo().unwrap().to_string(),
        r#"{"$and":[{"$or":[{"metadata.author":"john"},{"metadata.author":"jill"}]},{"metadata.article_type":"blog"}]}"#
    );
}

#[test]
fn sql_fragment_is_fully_parameterized() {
    let filter =
        Filter::parse("title == 'it\\'s a \\\\ test' || author in ['a','b']").unwrap();
    let sql = filter.to_sql(2);

    // No literal values may appear in the clause text.
    assert!(!sql.clause.contains("test"));
    assert!(!sql.clause.contains('\\'));
    assert_eq!(
        sql.binds[0],
        SqlBind::Text("it's a \\ test".to_string())
    );
    // Placeholders are numbered contiguously from the requested start.
    assert!(sql.clause.contains("$2"));
    assert!(sql.clause.contains("$3"));
    assert!(sql.clause.contains("$4"));
    assert!(!sql.clause.contains("$5"));
}

#[test]
fn evaluation_matches_expected_documents() {
    let filter = Filter::parse("author in ['john','jill'] && article_type == 'blog'").unwrap();

    let matching = meta(&[
        ("author", json!("jill")),
        ("article_type", json!("blog")),
    ]);
    let wrong_type = meta(&[
        ("author", json!("jill")),
        ("article_type", json!("news")),
    ]);
    let wrong_author = meta(&[
        ("author", json!("bob")),
        ("article_type", json!("blog")),
    ]);

    assert!(filter.matches(&matching));
    assert!(!filter.matches(&wrong_type));
    assert!(!filter.matches(&wrong_author));
}

#[test]
fn precedence_is_observable_in_evaluation() {
    // a==1 || b==2 && c==3  must not require a==1 when b and c both match.
    let filter = Filter::parse("a == 1 || b == 2 && c == 3").unwrap();

    assert!(filter.matches(&meta(&[("a", json!(1))])));
    assert!(filter.matches(&meta(&[("b", json!(2)), ("c", json!(3))])));
    assert!(!filter.matches(&meta(&[("b", json!(2))])));
}
