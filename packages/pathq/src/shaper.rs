//! Result shaping
//!
//! Converts raw match records into the configured output shape and applies
//! the wrap/flatten rules: an empty result with wrapping off is the null
//! sentinel, a single non-multi-match result with wrapping off is returned
//! unwrapped, and everything else is a sequence.

use serde::Serialize;
use serde_json::Value;

use crate::config::{QueryOptions, ResultType};
use crate::paths;
use crate::tracer::Match;

/// Full record as materialized for `resultType = "all"`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShapedMatch<'a> {
    path: String,
    value: &'a Value,
    parent: &'a Value,
    parent_property: &'a Value,
    pointer: String,
    has_arr_expr: bool,
}

/// Shape a single record according to the result type
#[must_use]
pub fn preferred_output(record: &Match, result_type: ResultType) -> Value {
    match result_type {
        ResultType::Value => record.value.clone(),
        ResultType::Parent => record.parent.clone().unwrap_or(Value::Null),
        ResultType::ParentProperty => record.parent_property.clone(),
        ResultType::Path => Value::String(paths::to_path_string(&record.path)),
        ResultType::Pointer => Value::String(paths::to_pointer(&record.path)),
        ResultType::All => {
            let shaped = ShapedMatch {
                path: paths::to_path_string(&record.path),
                value: &record.value,
                parent: record.parent.as_ref().unwrap_or(&Value::Null),
                parent_property: &record.parent_property,
                pointer: paths::to_pointer(&record.path),
                has_arr_expr: record.has_arr_expr,
            };
            serde_json::to_value(shaped).unwrap_or(Value::Null)
        }
    }
}

/// Shape the full record list into the user-facing result
#[must_use]
pub fn shape(records: &[Match], options: &QueryOptions) -> Value {
    if records.is_empty() {
        return if options.wrap {
            Value::Array(Vec::new())
        } else {
            Value::Null
        };
    }

    if !options.wrap && records.len() == 1 && !records[0].has_arr_expr {
        return preferred_output(&records[0], options.result_type);
    }

    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let shaped = preferred_output(record, options.result_type);
        if options.flatten {
            if let Value::Array(items) = shaped {
                out.extend(items);
                continue;
            }
        }
        out.push(shaped);
    }
    Value::Array(out)
}
