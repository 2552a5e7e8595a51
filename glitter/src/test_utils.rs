//! Shared test utilities.

use crate::model::Block;
use crate::position::{FilePos, SourceLine};

/// Creates a source line with an explicit position.
pub fn line(filename: &str, lineno: usize, text: &str) -> SourceLine {
    SourceLine::new(FilePos::new(filename, lineno), text)
}

/// Creates a block from line texts, numbered from 1 in `test.gw`.
pub fn block_of(texts: &[&str]) -> Block {
    let mut block = Block::new();
    for (i, text) in texts.iter().enumerate() {
        block.push(line("test.gw", i + 1, text));
    }
    block
}
