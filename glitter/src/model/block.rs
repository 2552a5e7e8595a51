//! Blocks of positioned source lines and their finalisation.

use crate::position::SourceLine;

/// An ordered sequence of source lines making up one fragment definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub lines: Vec<SourceLine>,
}

impl Block {
    /// Creates an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line to the block.
    pub fn push(&mut self, line: SourceLine) {
        self.lines.push(line);
    }

    /// Returns the number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the block has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Finalises a collected block: leading and trailing all-whitespace
    /// lines are discarded, then the minimum whitespace prefix over
    /// non-blank lines (counted in code points) is removed from every line
    /// long enough to carry it.
    pub fn finalize(mut self) -> Self {
        self.trim_blank_edges();
        self.deindent();
        self
    }

    fn trim_blank_edges(&mut self) {
        let is_blank = |l: &SourceLine| l.text.trim().is_empty();
        let first = match self.lines.iter().position(|l| !is_blank(l)) {
            Some(i) => i,
            None => {
                self.lines.clear();
                return;
            }
        };
        let last = self.lines.iter().rposition(|l| !is_blank(l)).unwrap();
        self.lines.drain(last + 1..);
        self.lines.drain(..first);
    }

    fn deindent(&mut self) {
        let min_indent = self
            .lines
            .iter()
            .filter(|l| !l.text.trim().is_empty())
            .map(|l| whitespace_prefix_len(&l.text))
            .min();
        let Some(min_indent) = min_indent else { return };
        if min_indent == 0 {
            return;
        }
        for line in &mut self.lines {
            if line.text.chars().count() >= min_indent {
                line.text = line.text.chars().skip(min_indent).collect();
            }
        }
    }
}

/// Counts the whitespace code points prefixing the line.
fn whitespace_prefix_len(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}
