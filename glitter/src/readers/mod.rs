//! Source readers: the include-aware scanner, the line classifier and
//! tangle-root discovery.

mod discover;
mod line_kind;
mod scanner;

pub use discover::find_tangle_files;
pub use line_kind::{classify, has_property, strip_text_start, LineKind, CODE_REF, INLINE_CODE};
pub use scanner::{Scanner, MAX_INCLUDE_DEPTH};
