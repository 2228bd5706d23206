//! Pluggable expression backend for filter and script steps
//!
//! The backend is a capability with two operations: compile a source
//! fragment once, then run the compiled program against a binding
//! environment. The default backend is the safe interpreter in
//! [`safe`]; callers may supply their own engine or a bare callable, or
//! disable expression evaluation entirely.

pub mod safe;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{JsonPathError, JsonPathResult};

pub use safe::SafeEngine;

/// Binding environment handed to the backend for one evaluation
pub type ScriptBindings = serde_json::Map<String, Value>;

/// A compiled expression, runnable many times against fresh bindings
pub trait CompiledScript: Send + Sync {
    fn run(&self, bindings: &ScriptBindings) -> JsonPathResult<Value>;
}

/// Compile-once-run-many expression backend
pub trait ExpressionEngine: Send + Sync {
    fn compile(&self, source: &str) -> JsonPathResult<Arc<dyn CompiledScript>>;
}

/// Caller-supplied two-argument evaluation function
pub type EvalCallable =
    Arc<dyn Fn(&str, &ScriptBindings) -> JsonPathResult<Value> + Send + Sync>;

/// Backend selector for filter `[?(…)]` and script `[(…)]` steps
#[derive(Clone, Default)]
pub enum EvalMode {
    /// Strict interpreter over a whitelisted grammar (the default)
    #[default]
    Safe,
    /// Host script VM; recognized but unavailable in this build, so
    /// selecting it is a configuration error
    Native,
    /// Filter and script steps are forbidden
    Disabled,
    /// Caller-supplied `(source, bindings) -> value` function
    Callable(EvalCallable),
    /// Caller-supplied compile-once-run-many engine
    Engine(Arc<dyn ExpressionEngine>),
}

impl EvalMode {
    /// Tag used as the compiled-script cache key prefix
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Native => "native",
            Self::Disabled => "disabled",
            Self::Callable(_) => "callable",
            Self::Engine(_) => "engine",
        }
    }

    /// Whether filter/script steps may run at all
    #[must_use]
    pub fn allows_eval(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl fmt::Debug for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

lazy_static! {
    static ref CURRENT_VALUE: Regex =
        Regex::new(r"@([.\s)\[])").expect("current value regex");
}

/// Rewrite JSONPath meta-tokens in an expression source to their binding
/// names. Longest tokens first so `@parentProperty` is not clipped by the
/// `@parent` rewrite.
#[must_use]
pub fn rewrite_meta_tokens(source: &str) -> String {
    let pass = source
        .replace("@parentProperty", "_$_parentProperty")
        .replace("@parent", "_$_parent")
        .replace("@property", "_$_property")
        .replace("@root", "_$_root");
    let pass = CURRENT_VALUE.replace_all(&pass, "_$$_v${1}");
    pass.replace("@path", "_$_path")
}

/// Bounded cache of compiled programs, keyed by backend tag and source text
pub struct ScriptCache {
    cache: RwLock<HashMap<String, Arc<dyn CompiledScript>>>,
}

impl ScriptCache {
    const MAX_ENTRIES: usize = 256;

    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<Arc<dyn CompiledScript>> {
        self.cache.read().ok()?.get(key).cloned()
    }

    fn insert(&self, key: String, script: Arc<dyn CompiledScript>) {
        if let Ok(mut cache) = self.cache.write() {
            if cache.len() < Self::MAX_ENTRIES {
                cache.insert(key, script);
            }
        }
    }
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile (with memoization) and run an expression source against the
/// given bindings. The source is rewritten for meta-tokens before it
/// reaches the backend.
pub fn evaluate_expression(
    mode: &EvalMode,
    cache: &ScriptCache,
    source: &str,
    bindings: &ScriptBindings,
) -> JsonPathResult<Value> {
    let rewritten = rewrite_meta_tokens(source);
    match mode {
        EvalMode::Disabled => Err(JsonPathError::eval_disabled("[(expr)]")),
        EvalMode::Native => Err(JsonPathError::configuration(
            "native script backend is not available in this build; \
             use the safe backend or supply a custom engine",
        )),
        EvalMode::Callable(call) => call(&rewritten, bindings),
        EvalMode::Safe => {
            let key = format!("{}:{source}", mode.tag());
            let program = match cache.get(&key) {
                Some(program) => program,
                None => {
                    let program = SafeEngine.compile(&rewritten)?;
                    cache.insert(key, program.clone());
                    program
                }
            };
            program.run(bindings)
        }
        EvalMode::Engine(engine) => {
            let key = format!("{}:{source}", mode.tag());
            let program = match cache.get(&key) {
                Some(program) => program,
                None => {
                    let program = engine.compile(&rewritten)?;
                    cache.insert(key, program.clone());
                    program
                }
            };
            program.run(bindings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_meta_tokens_in_order() {
        assert_eq!(rewrite_meta_tokens("@.n>1"), "_$_v.n>1");
        assert_eq!(
            rewrite_meta_tokens("@parentProperty=='x'"),
            "_$_parentProperty=='x'"
        );
        assert_eq!(rewrite_meta_tokens("@parent.a"), "_$_parent.a");
        assert_eq!(rewrite_meta_tokens("@property==0"), "_$_property==0");
        assert_eq!(rewrite_meta_tokens("@root.max"), "_$_root.max");
        assert_eq!(rewrite_meta_tokens("@path=='$'"), "_$_path=='$'");
        assert_eq!(rewrite_meta_tokens("(@ == 5)"), "(_$_v == 5)");
        assert_eq!(rewrite_meta_tokens("@['a']"), "_$_v['a']");
    }
}
