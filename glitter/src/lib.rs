//! glitter - Literate Programming Engine
//!
//! This library implements the core of the glitter literate programming
//! toolchain. A collection of source documents in a small block-oriented
//! markup produces two kinds of output:
//!
//! - **Tangle**: expand named code fragments into compilable source files
//! - **Weave**: produce a single typesettable document interleaving prose
//!   and code, annotated with cross-references between fragments
//!
//! # Example
//!
//! ```no_run
//! use glitter::config::Options;
//!
//! let options = Options::default();
//! let files = glitter::readers::find_tangle_files(&options, &["docs"]).unwrap();
//! glitter::tangle::tangle(&options, &files, false).unwrap();
//! ```

pub mod config;
pub mod errors;
pub mod hooks;
pub mod model;
pub mod paths;
pub mod position;
pub mod readers;
pub mod tangle;
pub mod weave;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use config::Options;
pub use errors::{GlitterError, Result};
pub use model::{Block, BlockStore, FragmentGraph};
pub use position::{FilePos, SourceLine};
