//! Canonical path renderings
//!
//! Converts the component list of a match record into the canonical
//! bracketed path string and into an RFC 6901 JSON Pointer. Components that
//! do not locate a child (`~`, `^`, type predicates) are suppressed in both
//! renderings.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SUPPRESSED: Regex =
        Regex::new(r"^(~|\^|@.*?\(\))$").expect("suppressed component regex");
    static ref NUMERIC_OR_WILDCARD: Regex =
        Regex::new(r"^[0-9*]+$").expect("numeric component regex");
}

/// Canonical bracketed path string for a component list
///
/// The first component is always rendered as `$`; numeric components and
/// wildcards render as `[n]`, everything else as `['name']`.
#[must_use]
pub fn to_path_string(components: &[String]) -> String {
    let mut out = String::from("$");
    for component in components.iter().skip(1) {
        if SUPPRESSED.is_match(component) {
            continue;
        }
        if NUMERIC_OR_WILDCARD.is_match(component) {
            out.push('[');
            out.push_str(component);
            out.push(']');
        } else {
            out.push_str("['");
            out.push_str(component);
            out.push_str("']");
        }
    }
    out
}

/// RFC 6901 JSON Pointer for a component list
///
/// Same suppression rule as [`to_path_string`]; `~` escapes to `~0` and `/`
/// to `~1` within each reference token.
#[must_use]
pub fn to_pointer(components: &[String]) -> String {
    let mut out = String::new();
    for component in components.iter().skip(1) {
        if SUPPRESSED.is_match(component) {
            continue;
        }
        out.push('/');
        out.push_str(&component.replace('~', "~0").replace('/', "~1"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn path_string_brackets_numeric_and_named() {
        let path = components(&["$", "store", "0", "title"]);
        assert_eq!(to_path_string(&path), "$['store'][0]['title']");
    }

    #[test]
    fn path_string_suppresses_non_locating_components() {
        let path = components(&["$", "k", "~"]);
        assert_eq!(to_path_string(&path), "$['k']");
        let path = components(&["$", "n", "@number()"]);
        assert_eq!(to_path_string(&path), "$['n']");
    }

    #[test]
    fn pointer_escapes_per_rfc_6901() {
        let path = components(&["$", "a~b", "c/d"]);
        assert_eq!(to_pointer(&path), "/a~0b/c~1d");
    }

    #[test]
    fn root_only_renders_bare() {
        assert_eq!(to_path_string(&components(&["$"])), "$");
        assert_eq!(to_pointer(&components(&["$"])), "");
    }
}
