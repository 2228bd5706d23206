//! Tests for path normalization
//!
//! Covers the rewrite pipeline for every step form of the dialect, cache
//! determinism, and canonical-string round-tripping.

use pathq::{normalize_components, JsonPath, Step, TokenCache};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_forms_normalize() {
        let cases = vec![
            ("$.a.b.c", vec!["$", "a", "b", "c"]),
            ("$['a']['b']", vec!["$", "a", "b"]),
            (r#"$["a"].b"#, vec!["$", "a", "b"]),
            ("$.a[0].b", vec!["$", "a", "0", "b"]),
            ("$.a[1:4]", vec!["$", "a", "1:4"]),
            ("$.a[::2]", vec!["$", "a", "::2"]),
            ("$[*]", vec!["$", "*"]),
            ("$['*']", vec!["$", "*"]),
            ("$..b", vec!["$", "..", "b"]),
            ("$..[0]", vec!["$", "..", "0"]),
            ("$.a.b.^", vec!["$", "a", "b", "^"]),
            ("$.a.^^", vec!["$", "a", "^", "^"]),
            ("$.k~", vec!["$", "k", "~"]),
            ("$['a','c']", vec!["$", "a','c"]),
            ("$[0,2]", vec!["$", "0,2"]),
            ("$.x[?(@.n>1)].n", vec!["$", "x", "?(@.n>1)", "n"]),
            ("$.a[(@.length-1)]", vec!["$", "a", "(@.length-1)"]),
            ("$..x@number()", vec!["$", "..", "x", "@number()"]),
            ("$['a.b'].c", vec!["$", "a.b", "c"]),
            ("$['a~b']", vec!["$", "a~b"]),
            ("$.`true", vec!["$", "`true"]),
            ("$", vec!["$"]),
        ];

        for (expr, expected) in cases {
            assert_eq!(
                normalize_components(expr),
                expected,
                "expression {expr} should normalize to {expected:?}"
            );
        }
    }

    #[test]
    fn test_nested_filter_survives_normalization() {
        assert_eq!(
            normalize_components("$.items[?(@.books[?(@.price>10)])]"),
            vec!["$", "items", "?(@.books[?(@.price>10)])"]
        );
    }

    #[test]
    fn test_cache_is_deterministic() {
        let cache = TokenCache::new();
        let exprs = vec!["$.a.b", "$..b", "$.x[?(@.n>1)]", "$['a','c']"];
        for expr in exprs {
            let first = cache.tokenize(expr);
            let second = cache.tokenize(expr);
            assert_eq!(
                first, second,
                "two tokenizations of {expr} must be identical"
            );
        }
    }

    #[test]
    fn test_facade_normalize_classifies_steps() {
        let jp = JsonPath::new();
        let steps = jp.normalize("$.x[?(@.n>1)][1:2]");
        assert_eq!(steps[0], Step::Root);
        assert_eq!(steps[1], Step::Key("x".to_string()));
        assert_eq!(steps[2], Step::Filter("@.n>1".to_string()));
        assert_eq!(
            steps[3],
            Step::Slice {
                start: Some(1),
                end: Some(2),
                step: 1
            }
        );
    }

    #[test]
    fn test_canonical_path_round_trips() {
        use serde_json::json;

        let doc = json!({"store": {"book": [{"title": "a"}, {"title": "b"}]}});
        let jp = JsonPath::new();
        let records = jp.matches(&doc, "$.store.book[*].title").expect("query");
        assert_eq!(records.len(), 2, "both titles should match");

        for record in records {
            let canonical = pathq::to_path_string(&record.path);
            assert_eq!(
                normalize_components(&canonical),
                record.path,
                "canonical string {canonical} should round-trip to the same components"
            );
        }
    }
}
