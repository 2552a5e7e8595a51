//! Lexical path cleaning.

use std::path::{Component, Path, PathBuf};

/// Cleans a path lexically: drops `.` segments and duplicate separators.
///
/// The result is never empty; a path that reduces to nothing becomes `.`.
/// No filesystem access takes place and `..` segments are kept as-is.
pub fn clean_path(path: &str) -> String {
    let mut cleaned = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            other => cleaned.push(other.as_os_str()),
        }
    }
    let s = cleaned.to_string_lossy().into_owned();
    if s.is_empty() {
        ".".to_string()
    } else {
        s
    }
}
