//! # pathq
//!
//! A JSONPath query engine for the widely-used superset dialect: descendant
//! recursion, wildcards, array slicing, union lists, filter and script
//! sub-expressions, parent (`^`) and property-name (`~`) selectors, and
//! type predicates.
//!
//! The pipeline: an expression string is normalized into a flat, memoized
//! sequence of step tokens; a recursive tracer walks the document guided by
//! those tokens, keeping precise location metadata for every match; a
//! shaper converts the match records into the configured output shape.
//! Filter `[?(…)]` and script `[(…)]` steps run on a pluggable expression
//! backend whose default is a strict safe interpreter.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//!
//! let doc = json!({"x": [{"n": 1}, {"n": 2}, {"n": 3}]});
//! let found = pathq::query(&doc, "$.x[?(@.n>1)].n").expect("query");
//! assert_eq!(found, json!([2, 3]));
//! ```
//!
//! Configured queries go through the [`JsonPath`] facade, which owns the
//! token and compiled-script caches:
//!
//! ```
//! use pathq::{JsonPath, QueryOptions, ResultType};
//! use serde_json::json;
//!
//! let doc = json!({"a": {"b": 1, "c": 2}, "d": {"b": 3}});
//! let jp = JsonPath::with_options(QueryOptions {
//!     result_type: ResultType::Path,
//!     ..QueryOptions::default()
//! })
//! .expect("options");
//! assert_eq!(
//!     jp.query(&doc, "$..b").expect("query"),
//!     json!(["$['a']['b']", "$['d']['b']"])
//! );
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod facade;
pub mod normalizer;
pub mod paths;
pub mod shaper;
pub mod tokens;
pub mod tracer;

pub use self::{
    config::{
        MatchCallback, OtherTypeCallback, QueryOptions, ResultType, UndefinedCallback,
    },
    error::{ErrorKind, JsonPathError, JsonPathResult},
    eval::{
        safe::is_truthy, CompiledScript, EvalCallable, EvalMode, ExpressionEngine, SafeEngine,
        ScriptBindings, ScriptCache,
    },
    facade::{query, JsonPath},
    normalizer::{normalize, normalize_components, to_canonical_string, TokenCache},
    paths::{to_path_string, to_pointer},
    tokens::{Step, TypeKind},
    tracer::{Match, MatchKind},
};
