//! Event classification.
//!
//! `classify` is pure: it looks only at the event and the layout, never at
//! the filesystem, so every rule is testable without a project on disk.

use std::path::PathBuf;

use crate::project::ProjectLayout;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

/// A single filesystem change, consumed once by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl RebuildEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// The closed set of things the planner can do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Wipe `html/` and regenerate it from `src/` and `static/`.
    FullRebuild,
    /// Compile one source document to its mirrored output.
    CompileOne(PathBuf),
    /// Copy one static asset to its mirrored output.
    CopyOne(PathBuf),
    /// Remove one output; absent is fine. A directory loses every file
    /// no longer backed by a source.
    DeleteOutput(PathBuf),
    /// Remove the pages under a mirrored directory whose source directory
    /// is gone. Anything but a directory is left alone.
    PruneOutput(PathBuf),
    Ignore,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FullRebuild => "full rebuild",
            Self::CompileOne(_) => "compile",
            Self::CopyOne(_) => "copy",
            Self::DeleteOutput(_) => "delete",
            Self::PruneOutput(_) => "prune",
            Self::Ignore => "ignore",
        }
    }
}

/// Map an event to an action. First matching rule wins:
///
/// 1. config file, not deleted → full rebuild
/// 2. menu file, not deleted → full rebuild
/// 3. source document → compile, or delete its output
/// 4. static asset → copy, or delete its output
/// 5. other path deleted under `src/` → prune its mirrored directory
/// 6. anything else → ignore
pub fn classify(event: &RebuildEvent, layout: &ProjectLayout) -> Action {
    let path = event.path.as_path();
    let deleted = event.kind == ChangeKind::Deleted;

    if layout.is_config_file(path) && !deleted {
        return Action::FullRebuild;
    }
    if layout.is_menu_file(path) && !deleted {
        return Action::FullRebuild;
    }
    if layout.is_document(path) {
        return match event.kind {
            ChangeKind::Deleted => mirrored_delete(layout.mirror_source(path)),
            _ => Action::CompileOne(path.to_path_buf()),
        };
    }
    if layout.is_static(path) {
        return match event.kind {
            ChangeKind::Deleted => mirrored_delete(layout.mirror_static(path)),
            _ => Action::CopyOne(path.to_path_buf()),
        };
    }
    // a removed directory reports only its own path
    if deleted
        && !layout.is_menu_file(path)
        && let Some(output) = layout.mirror_source_tree(path)
    {
        return Action::PruneOutput(output);
    }
    Action::Ignore
}

fn mirrored_delete(output: Option<PathBuf>) -> Action {
    output.map_or(Action::Ignore, Action::DeleteOutput)
}
