//! Path normalization utilities.

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`), falling back
/// to joining with the current directory for paths that do not exist yet.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Normalize a path whose final component may no longer exist.
///
/// Only the parent is canonicalized. Deleted files stay comparable with
/// paths under a canonical project root (e.g. `/var` vs `/private/var` on
/// macOS), and a symlinked file keeps its own path instead of its target's.
pub fn normalize_lossy(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .unwrap_or_else(|_| normalize_lossy(parent))
            .join(name),
        _ => normalize_path(path),
    }
}

/// `Path::strip_prefix`, comparing components without regard to ASCII case.
pub fn strip_prefix_ignore_case<'a>(path: &'a Path, base: &Path) -> Option<&'a Path> {
    let mut rest = path.components();
    for expected in base.components() {
        let actual = rest.next()?;
        if !actual.as_os_str().eq_ignore_ascii_case(expected.as_os_str()) {
            return None;
        }
    }
    Some(rest.as_path())
}
