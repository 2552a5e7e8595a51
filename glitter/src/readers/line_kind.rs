//! Line classification for the block-oriented markup.

use once_cell::sync::Lazy;
use regex::Regex;

static TEXT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*@(:+)").unwrap());
static CODE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*<<(.+)>>=\s*$").unwrap());
static DIRECTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*@glitter(\s.*)?$").unwrap());

/// A reference to a code block. `+?` prefers the shortest match so that
/// several references on one line are found separately; a reference name
/// cannot contain an unescaped `>>`.
pub static CODE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<(.+?)>>").unwrap());

/// Inline code in prose: `[[ ... ]]`.
pub static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[(.+?)\]\]").unwrap());

/// The classification of one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// `@:` with the run of colons; a run longer than one marks the next
    /// code block as important.
    TextStart(String),
    /// `<<name>>=` with the raw (uncanonicalised) name.
    CodeStart(String),
    /// `@glitter ...` with the trimmed remainder (possibly empty).
    Directive(String),
    /// Anything else.
    Other,
}

/// Classifies a line. Patterns are tried in order; first match wins.
pub fn classify(line: &str) -> LineKind {
    if let Some(caps) = TEXT_START.captures(line) {
        LineKind::TextStart(caps[1].to_string())
    } else if let Some(caps) = CODE_START.captures(line) {
        LineKind::CodeStart(caps[1].to_string())
    } else if let Some(caps) = DIRECTIVE.captures(line) {
        let rest = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        LineKind::Directive(rest.to_string())
    } else {
        LineKind::Other
    }
}

/// Returns true if a directive's argument contains the given property as a
/// whitespace-separated word.
pub fn has_property(rest: &str, property: &str) -> bool {
    rest.split_whitespace().any(|word| word == property)
}

/// Removes the text-start marker (`@:` and friends) from a line.
pub fn strip_text_start(line: &str) -> String {
    TEXT_START.replace(line, "").into_owned()
}
