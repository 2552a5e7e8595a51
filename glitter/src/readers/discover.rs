//! Discovery of tangle roots.
//!
//! A directory argument is walked for source files whose first non-blank
//! line is an `@glitter` directive carrying the `top` property; a plain
//! file argument is taken as-is.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ignore::WalkBuilder;

use crate::config::Options;
use crate::errors::{GlitterError, Result};
use crate::paths::clean_path;
use crate::readers::line_kind::{classify, has_property, LineKind};

/// Builds the sorted, deduplicated list of files to tangle from a mixed
/// list of file and directory arguments.
pub fn find_tangle_files<S: AsRef<str>>(options: &Options, args: &[S]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for arg in args {
        out.extend(find_top_files(options, arg.as_ref())?);
    }
    out.sort();
    out.dedup();
    Ok(out)
}

/// Resolves one argument: a file passes through, a directory is walked.
fn find_top_files(options: &Options, name: &str) -> Result<Vec<String>> {
    let name = clean_path(name);
    let meta = std::fs::metadata(&name).map_err(|source| GlitterError::OpenFailed {
        path: name.clone(),
        source,
    })?;
    if !meta.is_dir() {
        return Ok(vec![name]);
    }

    let ext = options.get("SourceExt");
    let mut out = Vec::new();
    let walk = WalkBuilder::new(&name)
        .standard_filters(false)
        .follow_links(false)
        .build();
    for entry in walk {
        let entry = entry.map_err(|e| GlitterError::OpenFailed {
            path: name.clone(),
            source: std::io::Error::other(e),
        })?;
        let path = entry.path();
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        let is_source = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(ext))
            .unwrap_or(false);
        if is_source && has_top_property(path) {
            out.push(path.to_string_lossy().into_owned());
        }
    }
    Ok(out)
}

/// Returns true if the first non-blank line of the file is an `@glitter`
/// directive containing `top`. Any read failure counts as false.
fn has_top_property(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { return false };
        if line.trim().is_empty() {
            continue;
        }
        return matches!(classify(&line), LineKind::Directive(rest) if has_property(&rest, "top"));
    }
    false
}
