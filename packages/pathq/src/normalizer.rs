//! Path normalization into step tokens
//!
//! Rewrites a textual JSONPath expression into a flat component list, then
//! classifies each component into a tagged [`Step`]. The normalizer is
//! best-effort: it never rejects input, and malformed constructs surface
//! later as empty traces or expression-backend errors.
//!
//! Token lists are memoized per expression string in a bounded
//! [`TokenCache`]; identical inputs always yield equal token lists.

use std::collections::HashMap;
use std::sync::RwLock;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::tokens::Step;

lazy_static! {
    static ref TYPE_STEP: Regex = Regex::new(
        r"@(?:null|boolean|number|string|integer|undefined|nonFinite|scalar|array|object|function|other)\(\)"
    ).expect("type step regex");
    static ref QUOTED_PROP: Regex =
        Regex::new(r#"\[['"]([^'\]]*)['"]\]"#).expect("quoted property regex");
    static ref STEP_BOUNDARY: Regex =
        Regex::new(r#"(?P<dot>['"]?\.['"]?)|(?P<open>\[['"]?)"#).expect("step boundary regex");
    static ref PARENT_RUN: Regex = Regex::new(r";?(\^+);?").expect("parent run regex");
    static ref SEP_RUN: Regex = Regex::new(r";;;|;;").expect("separator run regex");
    static ref TRAILING: Regex = Regex::new(r";$|'?\]|'$").expect("trailing regex");
    static ref PLACEHOLDER: Regex = Regex::new(r"#(\d+)").expect("placeholder regex");
}

/// Normalize an expression into its raw path components
///
/// This is the ten-stage rewrite of the superset dialect: type predicates
/// and `~` become stand-alone tokens, parenthetical sub-expressions are
/// protected behind `#N` placeholders, quoted names have their inner `.`
/// and `~` shielded from the step splitter, parent runs explode into single
/// `^` tokens, and doubled separators collapse into the descendant token.
#[must_use]
pub fn normalize_components(expr: &str) -> Vec<String> {
    let mut subx: Vec<String> = Vec::new();

    let pass = TYPE_STEP.replace_all(expr, ";$0;");
    let pass = extract_parentheticals(&pass, &mut subx);
    let pass = QUOTED_PROP.replace_all(&pass, |caps: &Captures<'_>| {
        format!(
            "['{}']",
            caps[1].replace('.', "%@%").replace('~', "%%@@%%")
        )
    });
    let pass = pass.replace('~', ";~;");
    let pass = split_boundaries(&pass);
    let pass = pass.replace("%@%", ".").replace("%%@@%%", "~");
    let pass = PARENT_RUN.replace_all(&pass, |caps: &Captures<'_>| {
        let ups: Vec<String> = caps[1].chars().map(|c| c.to_string()).collect();
        format!(";{};", ups.join(";"))
    });
    let pass = SEP_RUN.replace_all(&pass, ";..;");
    let pass = TRAILING.replace_all(&pass, "");

    pass.split(';')
        .map(|part| match PLACEHOLDER.captures(part) {
            Some(caps) => {
                let slot: usize = caps[1].parse().unwrap_or(0);
                subx.get(slot).cloned().unwrap_or_else(|| part.to_string())
            }
            None => part.to_string(),
        })
        .collect()
}

/// Normalize an expression into classified step tokens
#[must_use]
pub fn normalize(expr: &str) -> Vec<Step> {
    let steps: Vec<Step> = normalize_components(expr)
        .iter()
        .map(|c| Step::classify(c))
        .collect();
    log::debug!("normalized {expr:?} into {} steps", steps.len());
    steps
}

/// Render a token list back to its canonical bracketed string
#[must_use]
pub fn to_canonical_string(steps: &[Step]) -> String {
    let components: Vec<String> = steps.iter().map(Step::raw).collect();
    crate::paths::to_path_string(&components)
}

/// Extract filter `?(…)` and script `(…)` fragments appearing inside
/// `[...]` or `['...']` into the side table, replacing each with an opaque
/// `[#N]` placeholder so their inner punctuation survives the later
/// rewrites. The scan is paren-balanced, so a filter nested inside another
/// filter stays intact for the tracer's two-stage probe.
fn extract_parentheticals(input: &str, subx: &mut Vec<String>) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '[' || c == '\'' {
            let mut j = i + 1;
            let filter = chars.get(j) == Some(&'?');
            if filter {
                j += 1;
            }
            if chars.get(j) == Some(&'(') {
                let mut depth = 0usize;
                let mut k = j;
                let mut close = None;
                while k < chars.len() {
                    match chars[k] {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                close = Some(k);
                                break;
                            }
                        }
                        _ => {}
                    }
                    k += 1;
                }
                if let Some(close) = close {
                    let fragment_start = if filter { j - 1 } else { j };
                    let fragment: String = chars[fragment_start..=close].iter().collect();
                    subx.push(fragment);
                    out.push_str("[#");
                    out.push_str(&(subx.len() - 1).to_string());
                    out.push(']');
                    i = close + 1;
                    if matches!(chars.get(i), Some(&']') | Some(&'\'')) {
                        i += 1;
                    }
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Replace step boundaries (unquoted dots outside brackets, opening
/// brackets with optional quotes) with the `;` separator.
///
/// Dots still inside an open bracket selector are left alone; this stands
/// in for the original's `(?![^[]*\])` lookahead, which `regex` does not
/// support.
fn split_boundaries(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in STEP_BOUNDARY.captures_iter(input) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        out.push_str(&input[last..whole.start()]);
        if caps.name("dot").is_some() && closes_before_opening(&input[whole.end()..]) {
            out.push_str(whole.as_str());
        } else {
            out.push(';');
        }
        last = whole.end();
    }
    out.push_str(&input[last..]);
    out
}

/// True when the remaining text reaches `]` before any `[`
fn closes_before_opening(rest: &str) -> bool {
    for c in rest.chars() {
        match c {
            '[' => return false,
            ']' => return true,
            _ => {}
        }
    }
    false
}

/// Memoizing token cache, keyed by expression text
///
/// Insert-if-below-bound: the cache grows to a fixed number of entries and
/// then stops admitting new expressions, so repeated queries stay fast
/// without unbounded growth.
pub struct TokenCache {
    cache: RwLock<HashMap<String, Vec<Step>>>,
}

impl TokenCache {
    const MAX_ENTRIES: usize = 256;

    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Tokenize an expression, reusing the cached token list when present
    pub fn tokenize(&self, expr: &str) -> Vec<Step> {
        if let Ok(cache) = self.cache.read() {
            if let Some(steps) = cache.get(expr) {
                return steps.clone();
            }
        }

        let steps = normalize(expr);

        if let Ok(mut cache) = self.cache.write() {
            if cache.len() < Self::MAX_ENTRIES {
                cache.insert(expr.to_string(), steps.clone());
            }
        }

        steps
    }

    /// Number of cached expressions
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_dotted_properties() {
        assert_eq!(normalize_components("$.a.b.c"), vec!["$", "a", "b", "c"]);
    }

    #[test]
    fn brackets_and_quotes_are_boundaries() {
        assert_eq!(normalize_components("$['a'].b[0]"), vec!["$", "a", "b", "0"]);
        assert_eq!(normalize_components(r#"$["a"]"#), vec!["$", "a"]);
    }

    #[test]
    fn quoted_dots_survive_splitting() {
        assert_eq!(normalize_components("$['a.b'].c"), vec!["$", "a.b", "c"]);
    }

    #[test]
    fn descendant_and_parent_tokens() {
        assert_eq!(normalize_components("$..b"), vec!["$", "..", "b"]);
        assert_eq!(
            normalize_components("$.a.^^"),
            vec!["$", "a", "^", "^"]
        );
    }

    #[test]
    fn parenthetical_steps_are_protected() {
        assert_eq!(
            normalize_components("$.x[?(@.n>1)].n"),
            vec!["$", "x", "?(@.n>1)", "n"]
        );
        assert_eq!(
            normalize_components("$.a[(@.length-1)]"),
            vec!["$", "a", "(@.length-1)"]
        );
    }

    #[test]
    fn nested_filters_stay_intact() {
        assert_eq!(
            normalize_components("$.book[?(@.reviews[?(@.score>5)])]"),
            vec!["$", "book", "?(@.reviews[?(@.score>5)])"]
        );
    }

    #[test]
    fn type_predicates_stand_alone() {
        assert_eq!(
            normalize_components("$..x@number()"),
            vec!["$", "..", "x", "@number()"]
        );
    }

    #[test]
    fn token_lists_render_canonically() {
        let steps = normalize("$.store.book[0].title~");
        assert_eq!(
            to_canonical_string(&steps),
            "$['store']['book'][0]['title']"
        );
    }

    #[test]
    fn cache_returns_identical_token_lists() {
        let cache = TokenCache::new();
        let first = cache.tokenize("$.store.book[*].author");
        let second = cache.tokenize("$.store.book[*].author");
        assert_eq!(first, second, "cached token lists must be identical");
        assert_eq!(cache.len(), 1);
    }
}
