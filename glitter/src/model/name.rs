//! Fragment name canonicalisation and top-level name parsing.
//!
//! A canonical name is the identity under which fragment definitions are
//! stored and looked up. A top-level name starts with `*` and resolves to
//! an output filename plus an ordering key; the fully-resolved form is
//! `* "filename" N` so that differently-written names that resolve to the
//! same output collide in the store.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{GlitterError, Result};
use crate::paths::clean_path;

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TOP_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\*\s*("[^"]*")?\s*(\d+)?\s*$"#).unwrap());

/// Reduces every run of the escape character by one: `#` disappears,
/// `##` becomes `#`, `###` becomes `##`. This is how a literal escape
/// character is written in content that survives to final output.
pub fn escape_pass(text: &str, esc: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for c in text.chars() {
        if c == esc {
            run += 1;
        } else {
            for _ in 1..run {
                out.push(esc);
            }
            run = 0;
            out.push(c);
        }
    }
    for _ in 1..run {
        out.push(esc);
    }
    out
}

/// Canonicalises a raw fragment name: trim, collapse inner whitespace to a
/// single space, lowercase unless top-level, then apply the escape pass.
pub fn canonical(raw: &str, esc: char) -> String {
    let name = SPACE_RUN.replace_all(raw.trim(), " ").into_owned();
    let name = if name.starts_with('*') {
        name
    } else {
        name.to_lowercase()
    };
    escape_pass(&name, esc)
}

/// Returns true for a top-level name (canonical form starting with `*`).
pub fn is_top_level(name: &str) -> bool {
    name.starts_with('*')
}

/// Parses a top-level name of the form `* "filename" 1234`.
///
/// Both parts are optional but must appear in that order. A missing or
/// empty or `.` filename resolves to `default_file`; a missing order is 0.
/// Returns `None` when the overall shape does not match.
pub fn parse_top_level(name: &str, default_file: &str) -> Option<(String, u32)> {
    let caps = TOP_LEVEL.captures(name)?;
    let mut filename = default_file.to_string();
    if let Some(group) = caps.get(1) {
        let inner = trim_quotes(group.as_str());
        if !inner.is_empty() && inner != "." {
            filename = clean_path(&inner);
        }
    }
    let order = caps
        .get(2)
        .and_then(|g| g.as_str().parse().ok())
        .unwrap_or(0);
    Some((filename, order))
}

/// Formats a fully-resolved top-level name.
pub fn resolved_top_level(filename: &str, order: u32) -> String {
    format!("* \"{}\" {}", filename, order)
}

/// Splits a fully-resolved top-level name back into its components.
/// Anything else is an internal error: only names produced by
/// [`resolved_top_level`] may reach this point.
pub fn split_top_level(name: &str) -> Result<(String, u32)> {
    let internal =
        || GlitterError::Internal(format!("incorrectly constructed top-level name `{name}`"));
    let caps = TOP_LEVEL.captures(name).ok_or_else(internal)?;
    let filename = caps.get(1).ok_or_else(internal)?;
    let order = caps
        .get(2)
        .and_then(|g| g.as_str().parse().ok())
        .ok_or_else(internal)?;
    Ok((trim_quotes(filename.as_str()), order))
}

/// Removes surrounding whitespace and a single `"` from each end.
fn trim_quotes(s: &str) -> String {
    let s = s.trim();
    let s = s.strip_prefix('"').unwrap_or(s);
    let s = s.strip_suffix('"').unwrap_or(s);
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_pass() {
        assert_eq!(escape_pass("a#b", '#'), "ab");
        assert_eq!(escape_pass("a##b", '#'), "a#b");
        assert_eq!(escape_pass("###", '#'), "##");
        assert_eq!(escape_pass("", '#'), "");
        assert_eq!(escape_pass("no escapes", '#'), "no escapes");
    }

    #[test]
    fn test_escape_pass_run_at_end() {
        assert_eq!(escape_pass("x#", '#'), "x");
        assert_eq!(escape_pass("x##", '#'), "x#");
    }

    #[test]
    fn test_canonical_basics() {
        assert_eq!(canonical("  Scan   Loop ", '#'), "scan loop");
        assert_eq!(canonical("a\tb", '#'), "a b");
    }

    #[test]
    fn test_canonical_idempotent() {
        for raw in ["  A  B ", "* \"out.go\"  2", "x##y", "MIXED Case"] {
            let once = canonical(raw, '#');
            assert_eq!(canonical(&once, '#'), once);
        }
    }

    #[test]
    fn test_canonical_keeps_top_level_case() {
        assert_eq!(canonical("* \"Out.GO\" 1", '#'), "* \"Out.GO\" 1");
    }

    #[test]
    fn test_canonical_applies_escape_pass() {
        assert_eq!(canonical("a##b", '#'), "a#b");
    }

    #[test]
    fn test_parse_top_level() {
        assert_eq!(
            parse_top_level("* \"out.go\" 2", "def.go"),
            Some(("out.go".to_string(), 2))
        );
        assert_eq!(
            parse_top_level("*", "def.go"),
            Some(("def.go".to_string(), 0))
        );
        assert_eq!(
            parse_top_level("* 7", "def.go"),
            Some(("def.go".to_string(), 7))
        );
        assert_eq!(
            parse_top_level("* \"\"", "def.go"),
            Some(("def.go".to_string(), 0))
        );
        assert_eq!(
            parse_top_level("* \".\"", "def.go"),
            Some(("def.go".to_string(), 0))
        );
    }

    #[test]
    fn test_parse_top_level_rejects_bad_shapes() {
        assert_eq!(parse_top_level("* 1 \"late.go\"", "d"), None);
        assert_eq!(parse_top_level("* name", "d"), None);
    }

    #[test]
    fn test_parse_top_level_cleans_filename() {
        assert_eq!(
            parse_top_level("* \"./a//b.go\"", "d"),
            Some(("a/b.go".to_string(), 0))
        );
    }

    #[test]
    fn test_resolved_roundtrip() {
        let name = resolved_top_level("out.go", 3);
        assert_eq!(name, "* \"out.go\" 3");
        assert_eq!(split_top_level(&name).unwrap(), ("out.go".to_string(), 3));
    }

    #[test]
    fn test_split_rejects_unresolved() {
        assert!(split_top_level("* \"out.go\"").is_err());
        assert!(split_top_level("*").is_err());
        assert!(split_top_level("not top level").is_err());
    }
}
