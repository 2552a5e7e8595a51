//! Recursive, include-aware source scanner.
//!
//! Presents the contents of a list of top-level files as one flat stream of
//! [`SourceLine`]s. An `@include "path"` line is replaced by the lines of
//! the named file; every line carries the position of the file that
//! physically contains it.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{GlitterError, Result};
use crate::paths::clean_path;
use crate::position::{FilePos, SourceLine};

/// Maximum depth of nested includes.
pub const MAX_INCLUDE_DEPTH: usize = 20;

static INCLUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s*@include\s+"(.+)"\s*$"#).unwrap());

/// One open file on the include stack.
struct Frame {
    filename: String,
    lineno: usize,
    lines: Lines<BufReader<File>>,
}

/// A pull scanner over a list of source files.
///
/// Iteration yields `Result<SourceLine>`; after the first error the stream
/// ends. All lines of one top-level file appear before any line of the
/// next, and an included file's lines appear at the include site.
pub struct Scanner {
    /// Top-level files still to be read, reversed so `pop` takes the next.
    pending: Vec<String>,
    stack: Vec<Frame>,
    processed: HashSet<String>,
    forbid_multiple_includes: bool,
    failed: bool,
}

impl Scanner {
    /// Creates a scanner over the given top-level files.
    pub fn new<S: AsRef<str>>(filenames: &[S]) -> Self {
        Self {
            pending: filenames.iter().rev().map(|s| s.as_ref().to_string()).collect(),
            stack: Vec::new(),
            processed: HashSet::new(),
            forbid_multiple_includes: false,
            failed: false,
        }
    }

    /// Skip any file that has already been read, even when it is included
    /// again by another file.
    pub fn forbid_multiple_includes(&mut self) {
        self.forbid_multiple_includes = true;
    }

    /// The position of the file currently being read, if any.
    pub fn current_pos(&self) -> Option<FilePos> {
        self.stack
            .last()
            .map(|f| FilePos::new(f.filename.clone(), f.lineno))
    }

    /// The current include depth (1 = top level).
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Opens a file and pushes it onto the stack. Returns false when the
    /// file is skipped under forbid-multiple-includes.
    fn push_file(&mut self, filename: &str) -> Result<bool> {
        let filename = clean_path(filename);
        if self.forbid_multiple_includes && self.processed.contains(&filename) {
            return Ok(false);
        }
        tracing::debug!("processing file `{}`", filename);
        let file = File::open(&filename).map_err(|source| GlitterError::OpenFailed {
            path: filename.clone(),
            source,
        })?;
        self.processed.insert(filename.clone());
        self.stack.push(Frame {
            filename,
            lineno: 0,
            lines: BufReader::new(file).lines(),
        });
        Ok(true)
    }

    fn fail(&mut self, err: GlitterError) -> Option<Result<SourceLine>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl Iterator for Scanner {
    type Item = Result<SourceLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let Some(frame) = self.stack.last_mut() else {
                let next = self.pending.pop()?;
                match self.push_file(&next) {
                    Ok(_) => continue,
                    Err(e) => return self.fail(e),
                }
            };

            let text = match frame.lines.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(source)) => {
                    let path = frame.filename.clone();
                    return self.fail(GlitterError::ReadFailed { path, source });
                }
                Some(Ok(text)) => text,
            };
            frame.lineno += 1;
            let pos = FilePos::new(frame.filename.clone(), frame.lineno);

            if let Some(caps) = INCLUDE.captures(&text) {
                if self.stack.len() >= MAX_INCLUDE_DEPTH {
                    return self.fail(GlitterError::IncludeTooDeep);
                }
                let included = caps[1].to_string();
                match self.push_file(&included) {
                    Ok(_) => continue,
                    Err(e) => return self.fail(e),
                }
            }

            return Some(Ok(SourceLine::new(pos, text)));
        }
    }
}
