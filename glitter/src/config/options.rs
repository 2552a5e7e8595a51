//! The keyed option table and its line-oriented override parser.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{GlitterError, Result};

/// Pattern for significant lines in an override file. Anything else is
/// ignored, so the options can live inside an ordinary typesetter class
/// file as comments.
static CONFIG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%glitter\s+(\S+)\s+(.*)$").unwrap());

/// The process-wide option table.
///
/// Constructed once at startup, optionally overridden from a file, then
/// immutable for the rest of the run. Values are template strings; `$n`
/// stands for a newline and is resolved at load time.
#[derive(Debug, Clone)]
pub struct Options {
    table: IndexMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string());
        let defaults: &[(&str, &str)] = &[
            ("Start", r"\documentclass{glittertex}"),
            ("StartBook", r"\glitterStartBook"),
            ("EndBook", r"\glitterEndBook"),
            ("StartText", r"\glitterStartText"),
            ("EndText", r"\glitterEndText$n"),
            ("StartCode", r"\glitterStartCode{$1}$n\begin{lstlisting}"),
            ("EndCode", r"\end{lstlisting}\glitterEndCode$n"),
            ("CodeEscape", "#"),
            ("CodeRef", r"\glitterCodeRef{$1}"),
            ("EscapeSub", r"{\glitterHash}"),
            ("InlineCode", r"\lstinline@$1@"),
            (
                "CodeSet",
                r"\glitterSet{blocktable=$blocktable,blockid=$blockid,blockseries=$blockseries}",
            ),
            ("WeaveLineRef", r#"%%line $lineno "$filename"$n"#),
            ("TangleLineRef", "/*line $filename:$lineno*/"),
            ("SourceExt", ".gw"),
            ("TangleExt", ".go"),
            ("WeaveCommand", r#"pdflatex "${weavefile}" && pdflatex "${weavefile}""#),
            ("TangleCommand", "go build"),
        ];

        let mut table: IndexMap<String, String> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.replace("$n", "\n")))
            .collect();
        table.insert("Shell".to_string(), shell);
        Self { table }
    }
}

impl Options {
    /// Creates the default option table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for a key, or the empty string for unknown keys.
    pub fn get(&self, key: &str) -> &str {
        self.table.get(key).map(String::as_str).unwrap_or("")
    }

    /// The escape character used by the escape pass and the weave
    /// code-escape protocol.
    pub fn escape_char(&self) -> char {
        self.get("CodeEscape").chars().next().unwrap_or('#')
    }

    /// Sets a single option programmatically. Values go in verbatim; the
    /// `$n` convention applies only to override files.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.table.insert(key.into(), value.into());
    }

    /// Reads an override file and merges its settings over the defaults.
    ///
    /// Only lines matching `%%glitter KEY VALUE` are significant; `$n` in a
    /// value becomes a newline. Unknown keys are kept.
    pub fn load_overrides(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            GlitterError::ConfigParseError(format!("cannot read `{}`: {}", path.display(), e))
        })?;

        for line in content.lines() {
            if let Some(caps) = CONFIG_LINE.captures(line.trim()) {
                let key = caps[1].trim().to_string();
                let value = caps[2].trim().replace("$n", "\n");
                self.table.insert(key, value);
            }
        }
        self.validate()
    }

    /// Checks option values that have a constrained shape.
    pub fn validate(&self) -> Result<()> {
        if self.get("CodeEscape").chars().count() != 1 {
            return Err(GlitterError::ConfigParseError(format!(
                "CodeEscape option must be a single character; got `{}`",
                self.get("CodeEscape")
            )));
        }
        Ok(())
    }
}
