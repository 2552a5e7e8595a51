//! Weaving: transcode the source stream into a typesettable document.
//!
//! A single pass drives a three-state automaton (preamble, text, code),
//! emitting templated output while a [`FragmentGraph`] tracks fragment
//! numbering, definition counts and cross-references. Code lines go
//! through the code-escape protocol so that fragment references can be
//! typeset as prose inside verbatim listings.

use std::io::Write;

use crate::config::{expand, expand_arg, line_pragma, Options};
use crate::errors::{GlitterError, Result};
use crate::model::{canonical, escape_pass, Block, FragmentGraph};
use crate::position::{FilePos, SourceLine};
use crate::readers::{
    classify, has_property, strip_text_start, LineKind, Scanner, CODE_REF, INLINE_CODE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    InText,
    InCode,
}

/// The weave driver. Holds the automaton state, the fragment graph and
/// the output sink for one run.
struct Weaver<'a> {
    options: &'a Options,
    esc: char,
    out: &'a mut dyn Write,
    out_name: &'a str,
    graph: FragmentGraph,
    state: State,
    /// Set by a `@::` text start; consumed when the next code block ends.
    important: bool,
    hiding: bool,
    /// Number of the enclosing code block, for reference bookkeeping.
    current_block: Option<usize>,
    buffer: Block,
}

/// Weaves the given files into a single typesettable stream.
///
/// Returns the fragment graph so callers can inspect numbering and
/// cross-references. Names that were mentioned but never defined are
/// reported as warnings; they do not stop the output.
pub fn weave<S: AsRef<str>, W: Write>(
    options: &Options,
    files: &[S],
    forbid_multiple_includes: bool,
    out: &mut W,
    out_name: &str,
) -> Result<FragmentGraph> {
    let mut scanner = Scanner::new(files);
    if forbid_multiple_includes {
        scanner.forbid_multiple_includes();
    }
    let weaver = Weaver {
        options,
        esc: options.escape_char(),
        out,
        out_name,
        graph: FragmentGraph::new(),
        state: State::Preamble,
        important: false,
        hiding: false,
        current_block: None,
        buffer: Block::new(),
    };
    weaver.run(scanner)
}

impl Weaver<'_> {
    fn run(mut self, mut scanner: Scanner) -> Result<FragmentGraph> {
        let start = self.options.get("Start").to_string();
        self.write(&start)?;
        self.write("\n")?;

        let mut current_filename = String::new();
        while let Some(item) = scanner.next() {
            let line = item?;

            if line.pos.filename != current_filename {
                current_filename = line.pos.filename.clone();
                let pragma = line_pragma(self.options.get("WeaveLineRef"), &line.pos);
                self.write(&pragma)?;
            }

            let kind = classify(&line.text);
            if self.hiding && !matches!(kind, LineKind::Directive(_)) {
                continue;
            }
            match kind {
                LineKind::TextStart(colons) => self.on_text_start(&line, &colons)?,
                LineKind::CodeStart(arg) => self.on_code_start(&line, &arg)?,
                LineKind::Directive(rest) => {
                    if has_property(&rest, "hide") {
                        self.hiding = true;
                    }
                    if has_property(&rest, "show") {
                        self.hiding = false;
                    }
                }
                LineKind::Other => match self.state {
                    State::Preamble => {
                        let text = escape_pass(&line.text, self.esc);
                        self.write(&text)?;
                        self.write("\n")?;
                    }
                    State::InText => {
                        let text = self.process_text_line(&line.text, &line.pos);
                        self.write(&text)?;
                        self.write("\n")?;
                    }
                    State::InCode => {
                        let text = self.process_code_line(&line.text, &line.pos);
                        self.buffer.push(SourceLine::new(line.pos.clone(), text));
                    }
                },
            }
        }

        self.end_region()?;
        self.write("\n")?;
        let end_book = self.options.get("EndBook").to_string();
        self.write(&end_book)?;
        self.write("\n")?;

        if self.hiding {
            tracing::warn!("input ended while `hide` is still active");
        }
        for (name, info) in self.graph.undefined() {
            tracing::warn!(
                "{}: undefined block (#{}): `{}`",
                info.first_mention,
                info.number,
                name
            );
        }
        Ok(self.graph)
    }

    fn write(&mut self, s: &str) -> Result<()> {
        self.out
            .write_all(s.as_bytes())
            .map_err(|source| GlitterError::WriteFailed {
                path: self.out_name.to_string(),
                source,
            })
    }

    /// Emits the book start on the first text or code block.
    fn start_book_if_needed(&mut self) -> Result<()> {
        if self.state == State::Preamble {
            let start_book = self.options.get("StartBook").to_string();
            self.write(&start_book)?;
            self.write("\n")?;
        }
        Ok(())
    }

    /// Closes the currently open region: a buffered code block is
    /// finalised and written followed by `EndCode`, a text region gets
    /// `EndText`. The preamble needs no closing.
    fn end_region(&mut self) -> Result<()> {
        match self.state {
            State::InCode => {
                let block = std::mem::take(&mut self.buffer).finalize();
                for line in &block.lines {
                    self.write(&line.text)?;
                    self.write("\n")?;
                }
                let end_code = self.options.get("EndCode").to_string();
                self.write(&end_code)?;
                self.important = false;
            }
            State::InText => {
                let end_text = self.options.get("EndText").to_string();
                self.write(&end_text)?;
            }
            State::Preamble => {}
        }
        Ok(())
    }

    fn on_text_start(&mut self, line: &SourceLine, colons: &str) -> Result<()> {
        self.start_book_if_needed()?;
        self.end_region()?;
        self.current_block = None;
        self.state = State::InText;

        let rest = strip_text_start(&line.text);
        let processed = self.process_text_line(&rest, &line.pos);
        let pragma = line_pragma(self.options.get("WeaveLineRef"), &line.pos);
        let start_text = self.options.get("StartText").to_string();
        self.write(&pragma)?;
        self.write(&start_text)?;
        self.write(&processed)?;
        self.write("\n")?;

        if colons.chars().count() > 1 {
            self.important = true;
        }
        Ok(())
    }

    fn on_code_start(&mut self, line: &SourceLine, raw_name: &str) -> Result<()> {
        self.start_book_if_needed()?;
        self.end_region()?;
        self.state = State::InCode;

        // The definition syntax `<<name>>=` contains the reference syntax
        // `<<name>>`, so the ordinary mention pass registers the name.
        self.register_refs(&line.text, &line.pos);
        let name = canonical(raw_name, self.esc);
        self.current_block = self.graph.number_of(&name);
        let (number, series) = self.graph.define(&name).ok_or_else(|| {
            GlitterError::Internal(format!("block `{name}` missing from fragment graph"))
        })?;
        tracing::debug!("{}: at code block `{}`", line.pos, name);

        let important = if self.important { "true" } else { "false" };
        let set_cmd = expand(self.options.get("CodeSet"), |var| match var {
            "blocktable" => Some(important.to_string()),
            "blockid" => Some(number.to_string()),
            "blockseries" => Some(series.to_string()),
            _ => None,
        });
        let pragma = line_pragma(self.options.get("WeaveLineRef"), &line.pos);
        let start_code = expand_arg(self.options.get("StartCode"), raw_name);

        self.write(&set_cmd)?;
        self.write("\n")?;
        self.write(&pragma)?;
        self.write(&start_code)?;
        self.write("\n")?;

        self.buffer = Block::new();
        Ok(())
    }

    /// Records every `<<name>>` occurrence on the line in the graph.
    fn register_refs(&mut self, text: &str, pos: &FilePos) {
        for caps in CODE_REF.captures_iter(text) {
            let name = canonical(&caps[1], self.esc);
            self.graph.mention(&name, pos);
        }
    }

    /// Transforms a prose line: references become the `CodeRef` template,
    /// `[[...]]` becomes the `InlineCode` template, and the escape pass
    /// runs last.
    fn process_text_line(&mut self, text: &str, pos: &FilePos) -> String {
        self.register_refs(text, pos);
        let replaced = self.replace_code_refs(text);
        let replaced = replace_inline_code(&replaced, self.options);
        escape_pass(&replaced, self.esc)
    }

    /// Transforms a code line under the code-escape protocol.
    ///
    /// The escape pass runs first, over the raw user text, so that the
    /// escape characters inserted by the protocol survive emission.
    fn process_code_line(&mut self, text: &str, pos: &FilePos) -> String {
        self.register_refs(text, pos);
        let reduced = escape_pass(text, self.esc);
        self.replace_code_refs(&reduced)
    }

    /// Replaces every `<<name>>` reference on the line.
    ///
    /// In code state the remaining escape characters are substituted
    /// (`EscapeSub` inside references, toggle-wrapped outside) and the
    /// expanded `CodeRef` is wrapped in the escape character. The
    /// `blockid` variable renders as `??` while the name has no
    /// definition.
    fn replace_code_refs(&mut self, text: &str) -> String {
        let in_code = self.state == State::InCode;
        let template = self.options.get("CodeRef").to_string();
        let esc_str = self.esc.to_string();

        let line = if in_code {
            let sub = self.options.get("EscapeSub");
            let protected = substitute_escapes_in_refs(text, self.esc, sub);
            protected.replace(&esc_str, &format!("{}{}{}", esc_str, sub, esc_str))
        } else {
            text.to_string()
        };

        let mut result = String::with_capacity(line.len());
        let mut last = 0;
        for caps in CODE_REF.captures_iter(&line) {
            let whole = caps.get(0).expect("match has a whole group");
            let raw = &caps[1];
            let name = canonical(raw, self.esc);

            let blockid = match self.graph.get(&name) {
                Some(info) if info.definition_count > 0 => info.number.to_string(),
                _ => "??".to_string(),
            };
            if in_code {
                if let Some(enclosing) = self.current_block {
                    self.graph.reference(&name, enclosing);
                }
            }

            let expanded = expand(&expand_arg(&template, raw), |var| match var {
                "blockid" => Some(blockid.clone()),
                "name" => Some(raw.to_string()),
                _ => None,
            });

            result.push_str(&line[last..whole.start()]);
            if in_code {
                result.push(self.esc);
                result.push_str(&expanded);
                result.push(self.esc);
            } else {
                result.push_str(&expanded);
            }
            last = whole.end();
        }
        result.push_str(&line[last..]);
        result
    }
}

/// Replaces the escape character with `EscapeSub` inside every `<<...>>`
/// reference, leaving the rest of the line untouched.
fn substitute_escapes_in_refs(text: &str, esc: char, sub: &str) -> String {
    let esc_str = esc.to_string();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in CODE_REF.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        out.push_str(&m.as_str().replace(&esc_str, sub));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Replaces `[[ ... ]]` spans with the `InlineCode` template.
fn replace_inline_code(text: &str, options: &Options) -> String {
    let template = options.get("InlineCode");
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in INLINE_CODE.captures_iter(text) {
        let whole = caps.get(0).expect("match has a whole group");
        out.push_str(&text[last..whole.start()]);
        out.push_str(&expand_arg(template, &caps[1]));
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn run_weave(options: &Options, content: &str) -> (String, FragmentGraph) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.gw");
        fs::write(&path, content).unwrap();

        let mut out = Vec::new();
        let graph = weave(
            options,
            &[path.to_str().unwrap()],
            false,
            &mut out,
            "doc.tex",
        )
        .unwrap();
        (String::from_utf8(out).unwrap(), graph)
    }

    /// Options with short distinctive markers so tests can assert exact
    /// structure.
    fn marker_options() -> Options {
        let mut options = Options::default();
        options.set("Start", "|doc|");
        options.set("StartBook", "|book|");
        options.set("EndBook", "|endbook|");
        options.set("StartText", "|t|");
        options.set("EndText", "|/t|\n");
        options.set("StartCode", "|c:$1|");
        options.set("EndCode", "|/c|\n");
        options.set("CodeSet", "|set $blocktable $blockid $blockseries|");
        options.set("CodeRef", "[$blockid:$name]");
        options.set("InlineCode", "|i:$1|");
        options.set("WeaveLineRef", "");
        options
    }

    #[test]
    fn test_minimal_structure() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: hello\n");
        assert_eq!(out, "|doc|\n|book|\n|t| hello\n|/t|\n\n|endbook|\n");
    }

    #[test]
    fn test_preamble_copied_with_escape_pass() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "pre ## amble\n@: text\n");
        assert!(out.starts_with("|doc|\npre # amble\n|book|\n"));
    }

    #[test]
    fn test_code_block_structure() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: intro\n<<main>>=\nbody\n");
        // text region closed, code set emitted, code block started
        assert!(out.contains("|/t|\n|set false 1 0|\n|c:main|\nbody\n|/c|\n"));
    }

    #[test]
    fn test_text_reference_uses_plain_template() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: see <<main>> here\n<<main>>=\nbody\n");
        assert!(out.contains("|t| see [??:main] here\n"));
    }

    #[test]
    fn test_code_reference_wrapped_in_escape() {
        let options = marker_options();
        let (out, _) = run_weave(
            &options,
            "@: intro\n<<main>>=\nuse <<helper>>\n<<helper>>=\nh\n",
        );
        assert!(out.contains("use #[??:helper]#\n"));
    }

    #[test]
    fn test_defined_reference_renders_number() {
        let options = marker_options();
        let (out, _) = run_weave(
            &options,
            "@: intro\n<<helper>>=\nh\n<<main>>=\nuse <<helper>>\n",
        );
        // helper is #1 and already defined when referenced
        assert!(out.contains("use #[1:helper]#\n"));
    }

    #[test]
    fn test_escape_protocol_outside_refs() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: intro\n<<main>>=\na ## b\n");
        // the doubled escape reduces to one, which is toggle-wrapped
        assert!(out.contains("a #{\\glitterHash}# b\n"));
    }

    #[test]
    fn test_inline_code_in_text_only() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: use [[f(x)]] here\n<<main>>=\n[[not code]]\n");
        assert!(out.contains("|t| use |i:f(x)| here\n"));
        assert!(out.contains("[[not code]]\n"));
    }

    #[test]
    fn test_fragment_numbering_and_references() {
        let options = marker_options();
        let (_, graph) = run_weave(
            &options,
            "@: intro\n<<foo>>=\na\n<<bar>>=\nuse <<foo>>\n<<foo>>=\nb\n",
        );

        let foo = graph.get("foo").unwrap();
        assert_eq!(foo.number, 1);
        assert_eq!(foo.definition_count, 2);
        let bar_number = graph.number_of("bar").unwrap();
        assert_eq!(bar_number, 2);
        let referrers: Vec<_> = foo.referenced_from.iter().copied().collect();
        assert_eq!(referrers, vec![bar_number]);
    }

    #[test]
    fn test_series_index_counts_within_name() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: intro\n<<a>>=\nx\n<<a>>=\ny\n");
        assert!(out.contains("|set false 1 0|"));
        assert!(out.contains("|set false 1 1|"));
    }

    #[test]
    fn test_important_flag_consumed_by_next_block() {
        let options = marker_options();
        let (out, _) = run_weave(
            &options,
            "@:: loud\n<<a>>=\nx\n@: quiet\n<<b>>=\ny\n",
        );
        assert!(out.contains("|set true 1 0|"));
        assert!(out.contains("|set false 2 0|"));
    }

    #[test]
    fn test_undefined_fragment_survives_weave() {
        let options = marker_options();
        let (out, graph) = run_weave(&options, "@: intro\n<<main>>=\nuse <<missing>>\n");
        assert!(out.contains("#[??:missing]#"));
        let undefined: Vec<_> = graph.undefined().map(|(n, _)| n).collect();
        assert_eq!(undefined, vec!["missing"]);
        assert!(out.ends_with("|endbook|\n"));
    }

    #[test]
    fn test_hide_show() {
        let options = marker_options();
        let (out, _) = run_weave(
            &options,
            "@: seen\n@glitter hide\n@: hidden\n@glitter show\n@: visible\n",
        );
        assert!(out.contains("seen"));
        assert!(!out.contains("hidden"));
        assert!(out.contains("visible"));
    }

    #[test]
    fn test_unterminated_hide_still_finishes() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: seen\n@glitter hide\n@: hidden\n");
        assert!(out.ends_with("|endbook|\n"));
        assert!(!out.contains("hidden"));
    }

    #[test]
    fn test_file_change_pragma() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("inner.gw");
        fs::write(&inner, "@: included\n").unwrap();
        let outer = dir.path().join("outer.gw");
        fs::write(
            &outer,
            format!("@: outer\n@include \"{}\"\n@: back\n", inner.display()),
        )
        .unwrap();

        let mut options = marker_options();
        options.set("WeaveLineRef", "<line $lineno $filename>\n");

        let mut out = Vec::new();
        weave(
            &options,
            &[outer.to_str().unwrap()],
            false,
            &mut out,
            "doc.tex",
        )
        .unwrap();
        let out = String::from_utf8(out).unwrap();

        let inner_pragma = format!("<line 1 {}>", inner.display());
        let back_pragma = format!("<line 3 {}>", outer.display());
        assert!(out.contains(&inner_pragma));
        assert!(out.contains(&back_pragma));
    }

    #[test]
    fn test_code_start_in_preamble_opens_book() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "<<main>>=\nbody\n");
        assert!(out.contains("|book|\n|set false 1 0|\n"));
    }

    #[test]
    fn test_code_buffer_finalised_with_trim_and_deindent() {
        let options = marker_options();
        let (out, _) = run_weave(&options, "@: intro\n<<main>>=\n\n    a\n      b\n\n");
        assert!(out.contains("|c:main|\na\n  b\n|/c|\n"));
    }

    #[test]
    fn test_deterministic_output() {
        let options = marker_options();
        let content = "@: intro\n<<a>>=\nuse <<b>>\n<<b>>=\nx\n";
        let (first, _) = run_weave(&options, content);
        let (second, _) = run_weave(&options, content);
        assert_eq!(first, second);
    }
}
