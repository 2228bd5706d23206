//! Query configuration
//!
//! Options recognized by the facade, with the same defaults the original
//! dialect documents: `value` results, wrapping on, flattening off, the
//! safe expression backend.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::JsonPathError;
use crate::eval::EvalMode;
use crate::tracer::{Match, MatchKind};

/// Per-match callback: `(shaped value, kind, full record)`
pub type MatchCallback = Arc<dyn Fn(&Value, MatchKind, &Match) + Send + Sync>;

/// Classifier consulted by the `@other()` type predicate
pub type OtherTypeCallback = Arc<dyn Fn(&Value, &[String]) -> bool + Send + Sync>;

/// Synthesizes a value when a missing property is addressed; receives the
/// path the property would have had
pub type UndefinedCallback = Arc<dyn Fn(&[String]) -> Value + Send + Sync>;

/// Shape of the user-facing result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultType {
    /// The matched values themselves
    #[default]
    Value,
    /// Canonical bracketed path strings
    Path,
    /// RFC 6901 JSON Pointers
    Pointer,
    /// The containing values
    Parent,
    /// The keys or indices within the containers
    ParentProperty,
    /// Full records with path and pointer materialized
    All,
}

impl ResultType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Path => "path",
            Self::Pointer => "pointer",
            Self::Parent => "parent",
            Self::ParentProperty => "parentProperty",
            Self::All => "all",
        }
    }
}

impl FromStr for ResultType {
    type Err = JsonPathError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name {
            "value" => Self::Value,
            "path" => Self::Path,
            "pointer" => Self::Pointer,
            "parent" => Self::Parent,
            "parentProperty" => Self::ParentProperty,
            "all" => Self::All,
            other => {
                return Err(JsonPathError::configuration(format!(
                    "unknown result type '{other}'"
                )));
            }
        })
    }
}

/// Options for one query, also usable as facade-wide defaults
#[derive(Clone)]
pub struct QueryOptions {
    /// Shape of the returned result. Default `value`.
    pub result_type: ResultType,
    /// One-level flatten of sequence results. Default false.
    pub flatten: bool,
    /// Wrap results in a sequence even when a single scalar matched.
    /// Default true (see [`QueryOptions::default`]).
    pub wrap: bool,
    /// Extra bindings exposed to the expression backend
    pub sandbox: serde_json::Map<String, Value>,
    /// Expression backend selector. Default safe.
    pub eval: EvalMode,
    /// Seed parent for the root frame (embedded queries)
    pub parent: Option<Value>,
    /// Seed parent property for the root frame
    pub parent_property: Option<Value>,
    /// Invoked for every terminal match
    pub callback: Option<MatchCallback>,
    /// Classifier for `@other()`
    pub other_type_callback: Option<OtherTypeCallback>,
    /// Synthesizes values for missing properties
    pub undefined_callback: Option<UndefinedCallback>,
    /// Coerce backend failures to falsy instead of raising
    pub ignore_eval_errors: bool,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            result_type: ResultType::Value,
            flatten: false,
            wrap: true,
            sandbox: serde_json::Map::new(),
            eval: EvalMode::Safe,
            parent: None,
            parent_property: None,
            callback: None,
            other_type_callback: None,
            undefined_callback: None,
            ignore_eval_errors: false,
        }
    }
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("result_type", &self.result_type)
            .field("flatten", &self.flatten)
            .field("wrap", &self.wrap)
            .field("eval", &self.eval)
            .field("ignore_eval_errors", &self.ignore_eval_errors)
            .field("sandbox_keys", &self.sandbox.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
