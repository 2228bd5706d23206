//! Tagged step tokens for compiled JSONPath expressions
//!
//! Each path component produced by the normalizer is classified once into a
//! tagged variant, so the tracer dispatches on the tag instead of re-testing
//! string prefixes on every frame.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TYPE_PREDICATE: Regex = Regex::new(
        r"^@(null|boolean|number|string|integer|undefined|nonFinite|scalar|array|object|function|other)\(\)$"
    ).expect("type predicate regex");
    static ref SLICE: Regex = Regex::new(r"^(-?\d*):(-?\d*)(?::(\d*))?$").expect("slice regex");
    static ref NEGATIVE_INDEX: Regex = Regex::new(r"^-\d+$").expect("negative index regex");
}

/// Type classes testable with `@<kind>()` predicate steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Null,
    Boolean,
    Number,
    String,
    Integer,
    Undefined,
    NonFinite,
    Scalar,
    Array,
    Object,
    Function,
    Other,
}

impl TypeKind {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "number" => Self::Number,
            "string" => Self::String,
            "integer" => Self::Integer,
            "undefined" => Self::Undefined,
            "nonFinite" => Self::NonFinite,
            "scalar" => Self::Scalar,
            "array" => Self::Array,
            "object" => Self::Object,
            "function" => Self::Function,
            "other" => Self::Other,
            _ => return None,
        })
    }

    /// Name as it appears in expression text
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Undefined => "undefined",
            Self::NonFinite => "nonFinite",
            Self::Scalar => "scalar",
            Self::Array => "array",
            Self::Object => "object",
            Self::Function => "function",
            Self::Other => "other",
        }
    }
}

/// One compiled step of a JSONPath expression
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Root selector (`$`)
    Root,

    /// Wildcard over all immediate children (`*`)
    Wildcard,

    /// Recursive descent (`..`)
    Descendant,

    /// Parent selector (`^`), resolved one frame above via a sentinel
    Parent,

    /// Property-name selector (`~`), terminal
    PropertyName,

    /// Literal property name or integer-as-string array index
    Key(String),

    /// Backtick-escaped property, followed literally with no operator
    /// interpretation
    Literal(String),

    /// Array slice with optional signed endpoints and positive step
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: i64,
    },

    /// Filter step; holds the inner source of `?(…)`
    Filter(String),

    /// Script step; holds the full `(…)` source whose result becomes the
    /// next step token
    Script(String),

    /// Type predicate (`@null()` … `@other()`), terminal on success
    Type(TypeKind),

    /// Comma union; parts are re-classified and tried left-to-right
    Union(Vec<String>),
}

impl Step {
    /// Classify a raw path component into its tagged form
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        match raw {
            "$" => return Self::Root,
            "*" => return Self::Wildcard,
            ".." => return Self::Descendant,
            "^" => return Self::Parent,
            "~" => return Self::PropertyName,
            _ => {}
        }
        if let Some(caps) = TYPE_PREDICATE.captures(raw) {
            if let Some(kind) = TypeKind::parse(&caps[1]) {
                return Self::Type(kind);
            }
        }
        if let Some(inner) = raw.strip_prefix("?(").and_then(|r| r.strip_suffix(')')) {
            return Self::Filter(inner.to_string());
        }
        if raw.starts_with('(') {
            return Self::Script(raw.to_string());
        }
        if let Some(caps) = SLICE.captures(raw) {
            let parse = |m: Option<regex::Match<'_>>| {
                m.and_then(|m| {
                    if m.as_str().is_empty() {
                        None
                    } else {
                        m.as_str().parse::<i64>().ok()
                    }
                })
            };
            // A parsed step of zero falls back to 1; negative steps never
            // classify as slices.
            let step = parse(caps.get(3)).filter(|s| *s != 0).unwrap_or(1);
            return Self::Slice {
                start: parse(caps.get(1)),
                end: parse(caps.get(2)),
                step,
            };
        }
        if NEGATIVE_INDEX.is_match(raw) {
            // A bare negative index selects from the end of the array,
            // expressed as the tail slice `-n::1`.
            if let Ok(start) = raw.parse::<i64>() {
                return Self::Slice {
                    start: Some(start),
                    end: None,
                    step: 1,
                };
            }
        }
        if raw.contains(',') {
            let parts = raw
                .split(',')
                .map(|p| p.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
                .collect();
            return Self::Union(parts);
        }
        if let Some(name) = raw.strip_prefix('`') {
            return Self::Literal(name.to_string());
        }
        Self::Key(raw.to_string())
    }

    /// Render the step back to its raw component text
    #[must_use]
    pub fn raw(&self) -> String {
        match self {
            Self::Root => "$".to_string(),
            Self::Wildcard => "*".to_string(),
            Self::Descendant => "..".to_string(),
            Self::Parent => "^".to_string(),
            Self::PropertyName => "~".to_string(),
            Self::Key(name) => name.clone(),
            Self::Literal(name) => format!("`{name}"),
            Self::Slice { start, end, step } => {
                let fmt = |v: &Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
                format!("{}:{}:{step}", fmt(start), fmt(end))
            }
            Self::Filter(src) => format!("?({src})"),
            Self::Script(src) => src.clone(),
            Self::Type(kind) => format!("@{}()", kind.as_str()),
            Self::Union(parts) => parts.join(","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_operator_components() {
        assert_eq!(Step::classify("$"), Step::Root);
        assert_eq!(Step::classify("*"), Step::Wildcard);
        assert_eq!(Step::classify(".."), Step::Descendant);
        assert_eq!(Step::classify("^"), Step::Parent);
        assert_eq!(Step::classify("~"), Step::PropertyName);
    }

    #[test]
    fn classifies_slices_and_negative_indices() {
        assert_eq!(
            Step::classify("1:4"),
            Step::Slice {
                start: Some(1),
                end: Some(4),
                step: 1
            }
        );
        assert_eq!(
            Step::classify("::2"),
            Step::Slice {
                start: None,
                end: None,
                step: 2
            }
        );
        assert_eq!(
            Step::classify("-1"),
            Step::Slice {
                start: Some(-1),
                end: None,
                step: 1
            }
        );
        // zero step falls back to 1
        assert_eq!(
            Step::classify("1:4:0"),
            Step::Slice {
                start: Some(1),
                end: Some(4),
                step: 1
            }
        );
    }

    #[test]
    fn classifies_expression_steps() {
        assert_eq!(
            Step::classify("?(@.n>1)"),
            Step::Filter("@.n>1".to_string())
        );
        assert_eq!(
            Step::classify("(@.length-1)"),
            Step::Script("(@.length-1)".to_string())
        );
        assert_eq!(Step::classify("@number()"), Step::Type(TypeKind::Number));
    }

    #[test]
    fn classifies_unions_with_quote_stripping() {
        assert_eq!(
            Step::classify("a','c"),
            Step::Union(vec!["a".to_string(), "c".to_string()])
        );
        assert_eq!(
            Step::classify("0,2"),
            Step::Union(vec!["0".to_string(), "2".to_string()])
        );
    }

    #[test]
    fn plain_names_are_keys() {
        assert_eq!(Step::classify("store"), Step::Key("store".to_string()));
        assert_eq!(Step::classify("0"), Step::Key("0".to_string()));
        assert_eq!(
            Step::classify("`length"),
            Step::Literal("length".to_string())
        );
    }
}
