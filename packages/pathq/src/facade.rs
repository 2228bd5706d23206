//! Public facade
//!
//! [`JsonPath`] holds configuration defaults together with the token and
//! compiled-script caches, and dispatches a query through the normalizer,
//! the tracer, and the shaper. Construction and evaluation are distinct
//! entry points; clones of a facade share its caches.

use std::sync::Arc;

use serde_json::Value;

use crate::config::QueryOptions;
use crate::error::{JsonPathError, JsonPathResult};
use crate::eval::{EvalMode, ScriptCache};
use crate::normalizer::TokenCache;
use crate::shaper;
use crate::tokens::Step;
use crate::tracer::{self, Match};

/// JSONPath query facade
///
/// ```
/// use serde_json::json;
///
/// let doc = json!({"a": {"b": {"c": 7}}});
/// let jp = pathq::JsonPath::new();
/// let found = jp.query(&doc, "$.a.b.c").expect("query");
/// assert_eq!(found, json!([7]));
/// ```
#[derive(Clone)]
pub struct JsonPath {
    options: QueryOptions,
    token_cache: Arc<TokenCache>,
    script_cache: Arc<ScriptCache>,
}

impl JsonPath {
    /// Facade with default options
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: QueryOptions::default(),
            token_cache: Arc::new(TokenCache::new()),
            script_cache: Arc::new(ScriptCache::new()),
        }
    }

    /// Facade with the given defaults
    ///
    /// # Errors
    ///
    /// Returns a configuration error for backends that cannot be selected
    /// in this build.
    pub fn with_options(options: QueryOptions) -> JsonPathResult<Self> {
        validate_options(&options)?;
        Ok(Self {
            options,
            token_cache: Arc::new(TokenCache::new()),
            script_cache: Arc::new(ScriptCache::new()),
        })
    }

    /// The configured defaults
    #[must_use]
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Normalize an expression into step tokens, using the facade's cache
    #[must_use]
    pub fn normalize(&self, expr: &str) -> Vec<Step> {
        self.token_cache.tokenize(expr)
    }

    /// Evaluate an expression against a document with the facade defaults
    pub fn query(&self, json: &Value, expr: &str) -> JsonPathResult<Value> {
        self.query_with(json, expr, &self.options)
    }

    /// Evaluate with per-query option overrides
    pub fn query_with(
        &self,
        json: &Value,
        expr: &str,
        options: &QueryOptions,
    ) -> JsonPathResult<Value> {
        if expr.is_empty() {
            return Err(JsonPathError::configuration("missing path expression"));
        }
        let tokens = self.token_cache.tokenize(expr);
        self.query_tokens_with(json, &tokens, options)
    }

    /// Evaluate a pre-tokenized expression with the facade defaults
    pub fn query_tokens(&self, json: &Value, tokens: &[Step]) -> JsonPathResult<Value> {
        self.query_tokens_with(json, tokens, &self.options)
    }

    /// Evaluate a pre-tokenized expression with per-query overrides
    pub fn query_tokens_with(
        &self,
        json: &Value,
        tokens: &[Step],
        options: &QueryOptions,
    ) -> JsonPathResult<Value> {
        let records = self.trace(json, tokens, options)?;
        Ok(shaper::shape(&records, options))
    }

    /// Raw match records for an expression, unshaped
    pub fn matches(&self, json: &Value, expr: &str) -> JsonPathResult<Vec<Match>> {
        if expr.is_empty() {
            return Err(JsonPathError::configuration("missing path expression"));
        }
        let tokens = self.token_cache.tokenize(expr);
        self.trace(json, &tokens, &self.options)
    }

    fn trace(
        &self,
        json: &Value,
        tokens: &[Step],
        options: &QueryOptions,
    ) -> JsonPathResult<Vec<Match>> {
        validate_options(options)?;
        if tokens.is_empty() {
            return Err(JsonPathError::configuration("missing path expression"));
        }
        tracer::run_trace(json, tokens, options, &self.script_cache)
    }
}

impl Default for JsonPath {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_options(options: &QueryOptions) -> JsonPathResult<()> {
    if matches!(options.eval, EvalMode::Native) {
        return Err(JsonPathError::configuration(
            "native script backend is not available in this build; \
             use the safe backend or supply a custom engine",
        ));
    }
    Ok(())
}

/// One-shot query with default options
///
/// ```
/// use serde_json::json;
///
/// let doc = json!({"a": [1, 2, 3, 4, 5]});
/// assert_eq!(pathq::query(&doc, "$.a[1:4]").expect("query"), json!([2, 3, 4]));
/// ```
pub fn query(json: &Value, expr: &str) -> JsonPathResult<Value> {
    JsonPath::new().query(json, expr)
}
