//! Error types for the glitter pipeline.

use thiserror::Error;

use crate::position::FilePos;

/// Main error type for glitter operations.
#[derive(Error, Debug)]
pub enum GlitterError {
    #[error("include recursion depth exceeds maximum")]
    IncludeTooDeep,

    #[error("cannot open `{path}`: {source}")]
    OpenFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot read `{path}`: {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write `{path}`: {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("{pos}: badly formatted top-level name `{name}`")]
    BadTopLevelName { name: String, pos: FilePos },

    #[error("{pos}: unknown block reference `{name}`")]
    UndefinedReference { name: String, pos: FilePos },

    #[error("{pos}: cannot reference top-level block `{name}`")]
    CannotReferenceTopLevel { name: String, pos: FilePos },

    #[error("{pos}: expansion of `{name}` exceeds the depth limit")]
    ExpansionTooDeep { name: String, pos: FilePos },

    #[error("no top-level code blocks found")]
    NoTopLevelBlocks,

    #[error("configuration error: {0}")]
    ConfigParseError(String),

    #[error("post-build command failed: {0}")]
    CommandFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for glitter operations.
pub type Result<T> = std::result::Result<T, GlitterError>;
