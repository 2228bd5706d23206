//! Recursive tracer
//!
//! Walks a JSON document guided by the compiled step tokens, maintaining
//! precise location metadata (path, parent, parent property) for every
//! match. Parent selectors (`^`) are modeled as sentinels resolved one
//! frame above the frame that produced them; the active path is never
//! mutated in place.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Number, Value};

use crate::config::QueryOptions;
use crate::error::{ErrorKind, JsonPathError, JsonPathResult};
use crate::eval::safe::is_truthy;
use crate::eval::{self, ScriptBindings, ScriptCache};
use crate::paths;
use crate::shaper;
use crate::tokens::{Step, TypeKind};

lazy_static! {
    static ref NESTED_FILTER: Regex =
        Regex::new(r"@.?([^?]*)[\['](\??\(.*?\))[\]']").expect("nested filter regex");
}

/// One selected location in the document
#[derive(Debug, Clone)]
pub struct Match {
    /// Path components from the root; the first is always `$`
    pub path: Vec<String>,
    /// The value at that location
    pub value: Value,
    /// The value containing `value`; `None` at the root
    pub parent: Option<Value>,
    /// Key or index by which `parent` refers to `value`; `Null` at the root
    pub parent_property: Value,
    /// True when any step traversed to reach this match was a multi-match
    /// step (wildcard, descendant, slice, union, filter)
    pub has_arr_expr: bool,
}

/// Kind reported to per-match callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Value,
    Property,
}

impl MatchKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Property => "property",
        }
    }
}

/// Intermediate trace output: a terminal match or a deferred parent
/// selection awaiting resolution in a caller's frame
#[derive(Debug, Clone)]
pub(crate) enum TraceNode {
    Match(Match),
    ParentSentinel { path: Vec<String>, rest: Vec<Step> },
}

pub(crate) struct Tracer<'a> {
    root: &'a Value,
    options: &'a QueryOptions,
    script_cache: &'a ScriptCache,
    has_parent_selector: bool,
}

/// Run a full trace and keep only the terminal matches
pub(crate) fn run_trace(
    json: &Value,
    tokens: &[Step],
    options: &QueryOptions,
    script_cache: &ScriptCache,
) -> JsonPathResult<Vec<Match>> {
    let tokens = if tokens.first() == Some(&Step::Root) && tokens.len() > 1 {
        &tokens[1..]
    } else {
        tokens
    };

    let mut tracer = Tracer {
        root: json,
        options,
        script_cache,
        has_parent_selector: false,
    };

    let seed_property = options
        .parent_property
        .clone()
        .unwrap_or(Value::Null);
    let nodes = tracer.trace(
        tokens,
        json,
        &["$".to_string()],
        options.parent.as_ref(),
        &seed_property,
        false,
    )?;

    Ok(nodes
        .into_iter()
        .filter_map(|node| match node {
            TraceNode::Match(m) => Some(m),
            TraceNode::ParentSentinel { .. } => None,
        })
        .collect())
}

fn push(path: &[String], component: &str) -> Vec<String> {
    let mut next = Vec::with_capacity(path.len() + 1);
    next.extend_from_slice(path);
    next.push(component.to_string());
    next
}

fn prepend(step: Step, rest: &[Step]) -> Vec<Step> {
    let mut next = Vec::with_capacity(rest.len() + 1);
    next.push(step);
    next.extend_from_slice(rest);
    next
}

/// Immediate children in source order: arrays by ascending index, objects
/// by key insertion order. The first tuple element is the key as a JSON
/// value (index number or key string), the second its path component form.
fn child_entries(value: &Value) -> Vec<(Value, String, &Value)> {
    match value {
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, child)| (Value::Number(Number::from(i)), i.to_string(), child))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, child)| (Value::String(k.clone()), k.clone(), child))
            .collect(),
        _ => Vec::new(),
    }
}

fn get_child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

/// Key as it appears in binding environments and match records: a number
/// for array indices, a string for object keys
fn key_value(container: &Value, key: &str) -> Value {
    if container.is_array() {
        if let Ok(index) = key.parse::<u64>() {
            return Value::Number(Number::from(index));
        }
    }
    Value::String(key.to_string())
}

fn component_to_value(component: &str) -> Value {
    match component.parse::<u64>() {
        Ok(index) => Value::Number(Number::from(index)),
        Err(_) => Value::String(component.to_string()),
    }
}

fn value_to_component(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => {
            log::warn!("script step produced a non-scalar token: {other}");
            other.to_string()
        }
    }
}

/// First nested bracketed filter inside a filter source, if any: the
/// property chain leading to it and the inner expression. Mirrors the
/// original's heuristic; the `(?!.\)\])` guard is checked manually since
/// `regex` has no lookaround.
fn nested_filter(source: &str) -> Option<(String, String)> {
    for caps in NESTED_FILTER.captures_iter(source) {
        let inner = caps.get(2)?;
        let guard: Vec<char> = source[inner.end()..].chars().take(3).collect();
        let guarded = guard.len() == 3 && guard[1] == ')' && guard[2] == ']';
        if !guarded {
            return Some((caps[1].to_string(), inner.as_str().to_string()));
        }
    }
    None
}

impl<'a> Tracer<'a> {
    #[allow(clippy::too_many_lines)]
    fn trace(
        &mut self,
        tokens: &[Step],
        value: &Value,
        path: &[String],
        parent: Option<&Value>,
        parent_property: &Value,
        has_arr_expr: bool,
    ) -> JsonPathResult<Vec<TraceNode>> {
        let Some(loc) = tokens.first() else {
            let record = Match {
                path: path.to_vec(),
                value: value.clone(),
                parent: parent.cloned(),
                parent_property: parent_property.clone(),
                has_arr_expr,
            };
            self.handle_callback(&record, MatchKind::Value);
            return Ok(vec![TraceNode::Match(record)]);
        };
        let rest = &tokens[1..];
        let mut ret: Vec<TraceNode> = Vec::new();

        match loc {
            Step::Key(name) => {
                if let Some(child) = get_child(value, name) {
                    ret.extend(self.trace(
                        rest,
                        child,
                        &push(path, name),
                        Some(value),
                        &key_value(value, name),
                        has_arr_expr,
                    )?);
                } else if let Some(undefined) = self.options.undefined_callback.clone() {
                    if value.is_object() || value.is_array() {
                        let missing_path = push(path, name);
                        let synthesized = undefined(&missing_path);
                        ret.extend(self.trace(
                            rest,
                            &synthesized,
                            &missing_path,
                            Some(value),
                            &key_value(value, name),
                            has_arr_expr,
                        )?);
                    }
                }
            }

            Step::Literal(name) => {
                if let Some(child) = get_child(value, name) {
                    ret.extend(self.trace(
                        rest,
                        child,
                        &push(path, name),
                        Some(value),
                        &key_value(value, name),
                        has_arr_expr,
                    )?);
                } else if let Some(undefined) = self.options.undefined_callback.clone() {
                    if value.is_object() || value.is_array() {
                        let missing_path = push(path, name);
                        let synthesized = undefined(&missing_path);
                        ret.extend(self.trace(
                            rest,
                            &synthesized,
                            &missing_path,
                            Some(value),
                            &key_value(value, name),
                            has_arr_expr,
                        )?);
                    }
                }
            }

            Step::Wildcard => {
                for (key, component, child) in child_entries(value) {
                    ret.extend(self.trace(
                        rest,
                        child,
                        &push(path, &component),
                        Some(value),
                        &key,
                        true,
                    )?);
                }
            }

            Step::Descendant => {
                // match at this level first, then descend with the
                // unconsumed token list
                ret.extend(self.trace(rest, value, path, parent, parent_property, has_arr_expr)?);
                for (key, component, child) in child_entries(value) {
                    if child.is_object() || child.is_array() {
                        ret.extend(self.trace(
                            tokens,
                            child,
                            &push(path, &component),
                            Some(value),
                            &key,
                            true,
                        )?);
                    }
                }
            }

            Step::Parent => {
                self.has_parent_selector = true;
                let truncated = path[..path.len().saturating_sub(1)].to_vec();
                return Ok(vec![TraceNode::ParentSentinel {
                    path: truncated,
                    rest: rest.to_vec(),
                }]);
            }

            Step::PropertyName => {
                let record = Match {
                    path: push(path, "~"),
                    value: parent_property.clone(),
                    parent: parent.cloned(),
                    parent_property: Value::Null,
                    has_arr_expr,
                };
                self.handle_callback(&record, MatchKind::Property);
                return Ok(vec![TraceNode::Match(record)]);
            }

            Step::Root => {
                ret.extend(self.trace(rest, value, path, None, &Value::Null, has_arr_expr)?);
            }

            Step::Slice { start, end, step } => {
                if let Value::Array(arr) = value {
                    let len = arr.len() as i64;
                    let clamp = |bound: i64| {
                        if bound < 0 {
                            (bound + len).max(0)
                        } else {
                            bound.min(len)
                        }
                    };
                    let lower = clamp(start.unwrap_or(0));
                    let upper = clamp(end.unwrap_or(len));
                    let mut i = lower;
                    while i < upper {
                        let toks = prepend(Step::Key(i.to_string()), rest);
                        ret.extend(self.trace(
                            &toks,
                            value,
                            path,
                            parent,
                            parent_property,
                            true,
                        )?);
                        i += step;
                    }
                }
            }

            Step::Filter(source) => {
                if !self.options.eval.allows_eval() {
                    return Err(JsonPathError::eval_disabled("[?(expr)]"));
                }
                if let Some((sub_property, inner)) = nested_filter(source) {
                    // two-stage probe: keep children whose named sub-value
                    // matches the inner filter
                    let probe_tokens = vec![Step::classify(&inner)];
                    for (key, component, child) in child_entries(value) {
                        let probe_value = if sub_property.is_empty() {
                            Some(child)
                        } else {
                            get_child(child, &sub_property)
                        };
                        let Some(probe_value) = probe_value else {
                            continue;
                        };
                        let probe = self.trace(
                            &probe_tokens,
                            probe_value,
                            path,
                            parent,
                            parent_property,
                            true,
                        )?;
                        if !probe.is_empty() {
                            ret.extend(self.trace(
                                rest,
                                child,
                                &push(path, &component),
                                Some(value),
                                &key,
                                true,
                            )?);
                        }
                    }
                } else {
                    for (key, component, child) in child_entries(value) {
                        let bindings =
                            self.make_bindings(child, &key, path, parent, parent_property, source);
                        let verdict = self.eval_step(source, &bindings)?;
                        if is_truthy(&verdict) {
                            ret.extend(self.trace(
                                rest,
                                child,
                                &push(path, &component),
                                Some(value),
                                &key,
                                true,
                            )?);
                        }
                    }
                }
            }

            Step::Script(source) => {
                if !self.options.eval.allows_eval() {
                    return Err(JsonPathError::eval_disabled("[(expr)]"));
                }
                let last = path.last().cloned().unwrap_or_else(|| "$".to_string());
                let upto_parent = &path[..path.len().saturating_sub(1)];
                let bindings = self.make_bindings(
                    value,
                    &component_to_value(&last),
                    upto_parent,
                    parent,
                    parent_property,
                    source,
                );
                let result = self.eval_step(source, &bindings)?;
                let next = Step::classify(&value_to_component(&result));
                let toks = prepend(next, rest);
                ret.extend(self.trace(
                    &toks,
                    value,
                    path,
                    parent,
                    parent_property,
                    has_arr_expr,
                )?);
            }

            Step::Type(kind) => {
                if self.matches_type(*kind, value, path)? {
                    let record = Match {
                        path: push(path, &loc.raw()),
                        value: value.clone(),
                        parent: parent.cloned(),
                        parent_property: parent_property.clone(),
                        has_arr_expr,
                    };
                    self.handle_callback(&record, MatchKind::Value);
                    return Ok(vec![TraceNode::Match(record)]);
                }
            }

            Step::Union(parts) => {
                for part in parts {
                    let toks = prepend(Step::classify(part), rest);
                    ret.extend(self.trace(&toks, value, path, parent, parent_property, true)?);
                }
            }
        }

        // resolve any parent-selector sentinels gathered from child frames:
        // re-trace from the truncated path with this frame's value
        if self.has_parent_selector {
            let gathered = std::mem::take(&mut ret);
            for node in gathered {
                match node {
                    TraceNode::ParentSentinel {
                        path: truncated,
                        rest: pending,
                    } => {
                        ret.extend(self.trace(
                            &pending,
                            value,
                            &truncated,
                            parent,
                            parent_property,
                            has_arr_expr,
                        )?);
                    }
                    keep => ret.push(keep),
                }
            }
        }

        Ok(ret)
    }

    fn make_bindings(
        &self,
        current: &Value,
        current_name: &Value,
        path_to_parent: &[String],
        parent: Option<&Value>,
        parent_property: &Value,
        source: &str,
    ) -> ScriptBindings {
        let mut bindings = self.options.sandbox.clone();
        bindings.insert(
            "_$_parentProperty".to_string(),
            parent_property.clone(),
        );
        bindings.insert(
            "_$_parent".to_string(),
            parent.cloned().unwrap_or(Value::Null),
        );
        bindings.insert("_$_property".to_string(), current_name.clone());
        bindings.insert("_$_vname".to_string(), current_name.clone());
        bindings.insert("_$_root".to_string(), self.root.clone());
        bindings.insert("_$_v".to_string(), current.clone());
        if source.contains("@path") {
            let full = push(path_to_parent, &value_to_component(current_name));
            bindings.insert(
                "_$_path".to_string(),
                Value::String(paths::to_path_string(&full)),
            );
        }
        bindings
    }

    /// Evaluate a filter or script source, coercing backend failures to
    /// falsy when configured to ignore them
    fn eval_step(&self, source: &str, bindings: &ScriptBindings) -> JsonPathResult<Value> {
        match eval::evaluate_expression(&self.options.eval, self.script_cache, source, bindings) {
            Ok(value) => Ok(value),
            Err(err)
                if err.kind == ErrorKind::Expression && self.options.ignore_eval_errors =>
            {
                log::debug!("ignoring expression error: {err}");
                Ok(Value::Bool(false))
            }
            Err(err) => Err(err),
        }
    }

    fn matches_type(
        &self,
        kind: TypeKind,
        value: &Value,
        path: &[String],
    ) -> JsonPathResult<bool> {
        Ok(match kind {
            TypeKind::Null => value.is_null(),
            TypeKind::Boolean => value.is_boolean(),
            TypeKind::Number => value.is_number(),
            TypeKind::String => value.is_string(),
            TypeKind::Integer => value
                .as_f64()
                .map(|n| n.is_finite() && n.fract() == 0.0)
                .unwrap_or(false),
            TypeKind::NonFinite => value
                .as_f64()
                .map(|n| !n.is_finite())
                .unwrap_or(false),
            TypeKind::Scalar => !value.is_object() && !value.is_array(),
            TypeKind::Array => value.is_array(),
            TypeKind::Object => value.is_object(),
            // this document model carries neither undefined nor functions
            TypeKind::Undefined | TypeKind::Function => false,
            TypeKind::Other => match &self.options.other_type_callback {
                Some(classify) => classify(value, path),
                None => {
                    return Err(JsonPathError::classifier(
                        "you must supply an otherTypeCallback option to use the @other() operator",
                    ));
                }
            },
        })
    }

    fn handle_callback(&self, record: &Match, kind: MatchKind) {
        if let Some(callback) = &self.options.callback {
            let preferred = shaper::preferred_output(record, self.options.result_type);
            callback(&preferred, kind, record);
        }
    }
}
