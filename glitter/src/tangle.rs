//! Tangling: collect fragment definitions, then expand top-level blocks
//! into compilable source files.
//!
//! The read pass walks the scanned line stream once, accumulating
//! finalised blocks in a [`BlockStore`]. The write pass sorts the
//! top-level names by `(filename, order)` and recursively expands
//! `<<name>>` references, preserving call-site indentation and injecting
//! line pragmas.

use std::fs::File;
use std::io::{BufWriter, Write};

use crate::config::{line_pragma, Options};
use crate::errors::{GlitterError, Result};
use crate::model::{
    canonical, escape_pass, is_top_level, parse_top_level, resolved_top_level, split_top_level,
    Block, BlockStore,
};
use crate::paths::clean_path;
use crate::position::FilePos;
use crate::readers::{classify, has_property, LineKind, Scanner, CODE_REF};

/// Hard cap on recursive reference expansion; exceeding it reports
/// `ExpansionTooDeep`, which also turns reference cycles into a clean,
/// deterministic failure.
pub const MAX_EXPANSION_DEPTH: usize = 100;

/// Rewrites an input filename into its tangle output filename.
fn output_filename(options: &Options, input: &str) -> String {
    let cleaned = clean_path(input);
    let stem = cleaned
        .strip_suffix(options.get("SourceExt"))
        .unwrap_or(&cleaned);
    format!("{}{}", stem, options.get("TangleExt"))
}

/// Accumulates the block currently being read and finalises it into the
/// store at each block boundary.
struct Collector<'a> {
    options: &'a Options,
    store: BlockStore,
    current: Option<(String, Block)>,
}

impl Collector<'_> {
    fn finalize(&mut self) {
        if let Some((name, block)) = self.current.take() {
            let template = self.options.get("TangleLineRef");
            self.store
                .append(name, block.finalize(), |pos| line_pragma(template, pos));
        }
    }
}

/// Reads all fragment definitions from the given files into a block store.
///
/// Top-level names are resolved against the current output filename (the
/// last named file, defaulting to the physical input file with its
/// extension rewritten) and re-keyed in their resolved form. A `@glitter`
/// directive with the `top` property resets both the default and the
/// current output filename for its file and include subtree.
pub fn read_blocks<S: AsRef<str>>(
    options: &Options,
    files: &[S],
    forbid_multiple_includes: bool,
) -> Result<BlockStore> {
    let esc = options.escape_char();
    let mut scanner = Scanner::new(files);
    if forbid_multiple_includes {
        scanner.forbid_multiple_includes();
    }

    let mut collector = Collector {
        options,
        store: BlockStore::new(),
        current: None,
    };
    let mut current_top = String::new();
    let mut default_filename = String::new();
    let mut current_filename = String::new();

    while let Some(item) = scanner.next() {
        let line = item?;
        if scanner.depth() == 1 && line.pos.filename != current_top {
            current_top = line.pos.filename.clone();
            default_filename = output_filename(options, &current_top);
        }

        match classify(&line.text) {
            LineKind::TextStart(_) => collector.finalize(),
            LineKind::CodeStart(arg) => {
                collector.finalize();
                let mut name = canonical(&arg, esc);
                if is_top_level(&name) {
                    let Some((filename, order)) = parse_top_level(&name, &current_filename) else {
                        return Err(GlitterError::BadTopLevelName {
                            name,
                            pos: line.pos,
                        });
                    };
                    current_filename = if filename.is_empty() || filename == "." {
                        default_filename.clone()
                    } else {
                        filename
                    };
                    name = resolved_top_level(&current_filename, order);
                }
                tracing::debug!("{}: at code block `{}`", line.pos, name);
                collector.current = Some((name, Block::new()));
            }
            LineKind::Directive(rest) => {
                if has_property(&rest, "top") {
                    default_filename = output_filename(options, &line.pos.filename);
                    current_filename = default_filename.clone();
                }
            }
            LineKind::Other => {
                if let Some((_, block)) = collector.current.as_mut() {
                    block.push(line);
                }
            }
        }
    }
    collector.finalize();
    Ok(collector.store)
}

/// Recursively expands the first `<<name>>` reference on a line.
///
/// The referenced block's first line is glued to the text before the
/// reference (with a line pragma at the join); subsequent lines are
/// indented by the code-point length of that prefix; the text after the
/// reference is appended to the last line. A reference to an empty block
/// becomes a single space. Every produced line is expanded again.
pub fn expand_line(
    store: &BlockStore,
    options: &Options,
    esc: char,
    text: &str,
    pos: &FilePos,
    depth: usize,
    out: &mut Vec<String>,
) -> Result<()> {
    let Some(caps) = CODE_REF.captures(text) else {
        out.push(text.to_string());
        return Ok(());
    };
    let whole = caps.get(0).expect("match has a whole group");
    let name = canonical(&caps[1], esc);

    if is_top_level(&name) {
        return Err(GlitterError::CannotReferenceTopLevel {
            name,
            pos: pos.clone(),
        });
    }
    let Some(block) = store.get(&name) else {
        return Err(GlitterError::UndefinedReference {
            name,
            pos: pos.clone(),
        });
    };
    if depth >= MAX_EXPANSION_DEPTH {
        return Err(GlitterError::ExpansionTooDeep {
            name,
            pos: pos.clone(),
        });
    }

    let before = &text[..whole.start()];
    let after = &text[whole.end()..];

    if block.is_empty() {
        let joined = format!("{before} {after}");
        return expand_line(store, options, esc, &joined, pos, depth + 1, out);
    }

    let indent = " ".repeat(before.chars().count());
    let last = block.lines.len() - 1;
    for (i, refline) in block.lines.iter().enumerate() {
        let mut line = if i == 0 {
            format!(
                "{}{}{}",
                before,
                line_pragma(options.get("TangleLineRef"), &refline.pos),
                refline.text
            )
        } else {
            format!("{}{}", indent, refline.text)
        };
        if i == last {
            line.push_str(after);
        }
        expand_line(store, options, esc, &line, &refline.pos, depth + 1, out)?;
    }
    Ok(())
}

/// Expands one top-level block and writes it to the output.
fn write_block<W: Write>(
    store: &BlockStore,
    options: &Options,
    esc: char,
    block: &Block,
    w: &mut W,
    path: &str,
) -> Result<()> {
    let write_failed = |source| GlitterError::WriteFailed {
        path: path.to_string(),
        source,
    };
    if let Some(first) = block.lines.first() {
        let pragma = line_pragma(options.get("TangleLineRef"), &first.pos);
        w.write_all(pragma.as_bytes()).map_err(write_failed)?;
    }
    for line in &block.lines {
        let mut expanded = Vec::new();
        expand_line(store, options, esc, &line.text, &line.pos, 0, &mut expanded)?;
        for e in &expanded {
            writeln!(w, "{}", escape_pass(e, esc)).map_err(write_failed)?;
        }
    }
    Ok(())
}

/// Writes all top-level blocks from a completed store to their files.
///
/// Blocks are sorted by `(filename, order)`; consecutive blocks going to
/// the same file are separated by a blank line, and a filename change
/// flushes and replaces the output file. One output file is open at a
/// time.
pub fn write_outputs(store: &BlockStore, options: &Options) -> Result<()> {
    let tops = store.sorted_top_level()?;
    if tops.is_empty() {
        return Err(GlitterError::NoTopLevelBlocks);
    }
    tracing::debug!("{} total top-level blocks found", tops.len());

    let esc = options.escape_char();
    let mut out: Option<(String, BufWriter<File>)> = None;

    for name in &tops {
        let (filename, order) = split_top_level(name)?;
        let block = store
            .get(name)
            .ok_or_else(|| GlitterError::Internal(format!("missing top-level block `{name}`")))?;

        let same_file = out.as_ref().is_some_and(|(f, _)| *f == filename);
        let (path, mut w) = match out.take() {
            Some(entry) if same_file => entry,
            previous => {
                if let Some((f, mut w)) = previous {
                    w.flush()
                        .map_err(|source| GlitterError::WriteFailed { path: f, source })?;
                }
                let file = File::create(&filename).map_err(|source| GlitterError::WriteFailed {
                    path: filename.clone(),
                    source,
                })?;
                tracing::info!("writing to `{}` (order {})", filename, order);
                (filename, BufWriter::new(file))
            }
        };
        if same_file {
            writeln!(w).map_err(|source| GlitterError::WriteFailed {
                path: path.clone(),
                source,
            })?;
        }
        write_block(store, options, esc, block, &mut w, &path)?;
        out = Some((path, w));
    }

    if let Some((f, mut w)) = out.take() {
        w.flush()
            .map_err(|source| GlitterError::WriteFailed { path: f, source })?;
    }
    Ok(())
}

/// Produces all tangle outputs for the given input files.
pub fn tangle<S: AsRef<str>>(
    options: &Options,
    files: &[S],
    forbid_multiple_includes: bool,
) -> Result<()> {
    let store = read_blocks(options, files, forbid_multiple_includes)?;
    write_outputs(&store, options)
}
