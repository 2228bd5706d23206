//! Tests for the recursive tracer
//!
//! Covers the dispatch table step by step: ordering guarantees, parent
//! sentinels, property-name and type-predicate terminals, dynamic script
//! steps, literal-priority properties, and synthesized values.

use std::sync::Arc;

use pathq::{ErrorKind, JsonPath, QueryOptions};
use serde_json::{json, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_preserves_insertion_order() {
        let doc = json!({"b": 1, "a": 2, "c": 3});
        let found = JsonPath::new().query(&doc, "$.*").expect("query");
        assert_eq!(found, json!([1, 2, 3]), "object keys iterate in insertion order");
    }

    #[test]
    fn test_descendant_emits_self_before_children() {
        let doc = json!({"a": {"a": 1}});
        let found = JsonPath::new().query(&doc, "$..a").expect("query");
        assert_eq!(found, json!([{"a": 1}, 1]));
    }

    #[test]
    fn test_union_visits_left_to_right() {
        let doc = json!({"a": 1, "b": 2});
        let found = JsonPath::new().query(&doc, "$['b','a']").expect("query");
        assert_eq!(found, json!([2, 1]));
    }

    #[test]
    fn test_slice_variants() {
        let doc = json!([0, 1, 2, 3, 4]);
        let jp = JsonPath::new();
        let cases = vec![
            ("$[1:4]", json!([1, 2, 3])),
            ("$[::2]", json!([0, 2, 4])),
            ("$[-2:]", json!([3, 4])),
            ("$[:10]", json!([0, 1, 2, 3, 4])),
            ("$[-1]", json!([4])),
        ];
        for (expr, expected) in cases {
            assert_eq!(
                jp.query(&doc, expr).expect("query"),
                expected,
                "slice {expr} should select {expected}"
            );
        }
    }

    #[test]
    fn test_slice_ignores_non_arrays() {
        let doc = json!({"a": {"x": 1}});
        let found = JsonPath::new().query(&doc, "$.a[0:2]").expect("query");
        assert_eq!(found, json!([]));
    }

    #[test]
    fn test_parent_selector_ascends() {
        let doc = json!({"a": {"b": {"c": {"d": 9}}}});
        let jp = JsonPath::new();
        let found = jp.query(&doc, "$.a.b.c.d.^").expect("query");
        assert_eq!(found, json!([{"d": 9}]));

        let found = jp.query(&doc, "$.a.b.c.d.^^").expect("query");
        assert_eq!(found, json!([{"c": {"d": 9}}]));
    }

    #[test]
    fn test_parent_selector_after_descendant_search() {
        // the container of every matched leaf
        let doc = json!({"x": {"hit": 1}, "y": {"hit": 2}, "z": {"miss": 3}});
        let found = JsonPath::new().query(&doc, "$..hit.^").expect("query");
        assert_eq!(found, json!([{"hit": 1}, {"hit": 2}]));
    }

    #[test]
    fn test_property_name_selector_records() {
        let doc = json!({"k": "v"});
        let jp = JsonPath::new();
        assert_eq!(jp.query(&doc, "$.k~").expect("query"), json!(["k"]));

        let records = jp.matches(&doc, "$.k~").expect("query");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.value, json!("k"));
        assert_eq!(record.parent_property, Value::Null);
        assert_eq!(record.path, vec!["$", "k", "~"]);
    }

    #[test]
    fn test_type_predicates_classify_values() {
        let doc = json!({"a": 1, "b": 2.5, "c": "s", "d": [1], "e": {"k": 1}, "f": null, "g": true});
        let jp = JsonPath::new();
        let cases = vec![
            ("$.*@number()", json!([1, 2.5])),
            ("$.*@integer()", json!([1])),
            ("$.*@string()", json!(["s"])),
            ("$.*@array()", json!([[1]])),
            ("$.*@object()", json!([{"k": 1}])),
            ("$.*@null()", json!([null])),
            ("$.*@boolean()", json!([true])),
            ("$.*@scalar()", json!([1, 2.5, "s", null, true])),
        ];
        for (expr, expected) in cases {
            assert_eq!(
                jp.query(&doc, expr).expect("query"),
                expected,
                "predicate {expr} should select {expected}"
            );
        }
    }

    #[test]
    fn test_other_type_predicate_requires_classifier() {
        let doc = json!({"a": 1});
        let jp = JsonPath::new();
        let err = jp
            .query(&doc, "$.*@other()")
            .expect_err("@other() without a classifier must fail");
        assert_eq!(err.kind, ErrorKind::Classifier);

        let options = QueryOptions {
            other_type_callback: Some(Arc::new(|value, _path| value.as_i64() == Some(1))),
            ..QueryOptions::default()
        };
        let found = jp.query_with(&doc, "$.*@other()", &options).expect("query");
        assert_eq!(found, json!([1]));
    }

    #[test]
    fn test_backtick_escapes_operator_keys() {
        let doc = json!({"*": 5, "a": 1});
        let found = JsonPath::new().query(&doc, "$.`*").expect("query");
        assert_eq!(found, json!([5]), "backtick key must not be read as a wildcard");
    }

    #[test]
    fn test_script_step_selects_dynamic_index() {
        let doc = json!({"a": [10, 20, 30]});
        let found = JsonPath::new()
            .query(&doc, "$.a[(@.length-1)]")
            .expect("query");
        assert_eq!(found, json!([30]));
    }

    #[test]
    fn test_script_step_selects_dynamic_property() {
        let doc = json!({"pick": "b", "b": 42});
        let found = JsonPath::new().query(&doc, "$[(@.pick)]").expect("query");
        assert_eq!(found, json!([42]));
    }

    #[test]
    fn test_undefined_callback_synthesizes_values() {
        let doc = json!({"a": {}});
        let options = QueryOptions {
            undefined_callback: Some(Arc::new(|path| {
                json!(format!("synthesized:{}", path.join("/")))
            })),
            ..QueryOptions::default()
        };
        let found = JsonPath::new()
            .query_with(&doc, "$.a.missing", &options)
            .expect("query");
        assert_eq!(found, json!(["synthesized:$/a/missing"]));
    }

    #[test]
    fn test_nested_filter_probes_sub_matches() {
        let doc = json!({
            "items": [
                {"books": [{"price": 5}]},
                {"books": [{"price": 15}]},
                {"tags": ["x"]}
            ]
        });
        let found = JsonPath::new()
            .query(&doc, "$.items[?(@.books[?(@.price>10)])]")
            .expect("query");
        assert_eq!(found, json!([{"books": [{"price": 15}]}]));
    }

    #[test]
    fn test_match_records_are_mutually_consistent() {
        let doc = json!({
            "store": {
                "book": [
                    {"title": "one", "price": 8},
                    {"title": "two", "price": 12}
                ]
            }
        });
        let jp = JsonPath::new();
        for expr in ["$.store.book[*].title", "$..price", "$.store.book[?(@.price>10)]"] {
            let records = jp.matches(&doc, expr).expect("query");
            assert!(!records.is_empty(), "{expr} should match");
            for record in records {
                assert_eq!(record.path[0], "$", "paths start at the root");
                assert_eq!(
                    value_at(&doc, &record.path),
                    Some(&record.value),
                    "following {:?} from the root must reach the matched value",
                    record.path
                );
                let parent_path = &record.path[..record.path.len() - 1];
                assert_eq!(
                    value_at(&doc, parent_path),
                    record.parent.as_ref(),
                    "parent must sit at the path minus its last component"
                );
                let last = record.path.last().expect("non-empty path");
                let expected_property = match last.parse::<u64>() {
                    Ok(index) => json!(index),
                    Err(_) => json!(last),
                };
                assert_eq!(record.parent_property, expected_property);
            }
        }
    }

    #[test]
    fn test_root_frame_seeds_surface_through_property_name() {
        // seeds stand in for the surrounding document in embedded queries
        let container = json!({"embedded": true});
        let options = QueryOptions {
            parent: Some(container.clone()),
            parent_property: Some(json!("inner")),
            ..QueryOptions::default()
        };
        let doc = json!({"k": 1});
        let jp = JsonPath::with_options(options).expect("options");
        let records = jp.matches(&doc, "$~").expect("query");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, json!("inner"));
        assert_eq!(records[0].parent, Some(container));
    }

    /// Follow concrete path components from the root
    fn value_at<'v>(root: &'v Value, path: &[String]) -> Option<&'v Value> {
        let mut current = root;
        for component in &path[1..] {
            current = match current {
                Value::Object(map) => map.get(component)?,
                Value::Array(arr) => arr.get(component.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}
