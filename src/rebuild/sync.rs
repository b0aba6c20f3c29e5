//! Static mirroring between `static/` and `html/`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use jwalk::WalkDir;

use super::RebuildError;
use crate::project::collect_files;

/// Copy one file byte-for-byte, creating parent directories and
/// overwriting whatever is at `dst`.
pub fn copy_one(src: &Path, dst: &Path) -> Result<(), RebuildError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(RebuildError::io("create", parent))?;
    }
    fs::copy(src, dst).map_err(RebuildError::io("copy", src))?;
    Ok(())
}

/// Mirror every file under `src_dir` into `dst_dir`. Directories are not
/// copied themselves; they appear as parents of the files inside them.
///
/// Stops at the first failure. Returns the number of files copied.
pub fn copy_all(
    src_dir: &Path,
    dst_dir: &Path,
    on_copied: impl Fn(),
) -> Result<usize, RebuildError> {
    let files = collect_files(src_dir);
    for file in &files {
        let Ok(relative) = file.strip_prefix(src_dir) else {
            continue;
        };
        copy_one(file, &dst_dir.join(relative))?;
        on_copied();
    }
    Ok(files.len())
}

/// Remove one output file. Returns `false` when it was already gone.
///
/// Directories left empty by the removal are pruned up to, but not
/// including, `stop_at`.
pub fn delete_one(path: &Path, stop_at: &Path) -> Result<bool, RebuildError> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(RebuildError::io("delete", path)(e)),
    }

    if let Some(parent) = path.parent() {
        prune_upward(parent, stop_at);
    }
    Ok(true)
}

/// Remove every file under `dir` that `is_orphan` accepts, then every
/// directory left empty, up to but not including `stop_at`.
///
/// Returns the number of files removed. A missing `dir` removes nothing.
pub fn prune_orphans(
    dir: &Path,
    stop_at: &Path,
    is_orphan: impl Fn(&Path) -> bool,
) -> Result<usize, RebuildError> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for file in collect_files(dir) {
        if is_orphan(&file) {
            fs::remove_file(&file).map_err(RebuildError::io("delete", &file))?;
            removed += 1;
        }
    }

    // deepest first, so parents are empty by the time they are tried
    let mut subdirs: Vec<PathBuf> = WalkDir::new(dir)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path())
        .filter(|p| p != dir)
        .collect();
    subdirs.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
    for subdir in subdirs {
        let _ = fs::remove_dir(&subdir);
    }
    prune_upward(dir, stop_at);

    Ok(removed)
}

/// Remove `dir` and its ancestors while they are empty, stopping at
/// `stop_at`.
fn prune_upward(dir: &Path, stop_at: &Path) {
    let mut current = Some(dir);
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        // fails on non-empty directories, which is where pruning stops
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

/// Delete everything inside `dir`, keeping `dir` itself.
pub fn clear_dir(dir: &Path) -> Result<(), RebuildError> {
    let entries = fs::read_dir(dir).map_err(RebuildError::io("read", dir))?;
    for entry in entries {
        let entry = entry.map_err(RebuildError::io("read", dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(RebuildError::io("inspect", &path))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(RebuildError::io("delete", &path))?;
        } else {
            fs::remove_file(&path).map_err(RebuildError::io("delete", &path))?;
        }
    }
    Ok(())
}
