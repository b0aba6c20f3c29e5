//! Glob allow/deny filter over root-relative paths.

use std::path::Path;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::project::ProjectLayout;

/// Decides which paths under the project root reach the planner.
///
/// A path passes when it matches an allow pattern and no deny pattern, or
/// when it is a directory (present or already gone) matching a tree
/// pattern. Matching is case-insensitive.
pub struct WatchFilter {
    root: std::path::PathBuf,
    allow: GlobSet,
    deny: GlobSet,
    trees: GlobSet,
}

impl WatchFilter {
    pub fn new(root: &Path, allow: &[String], deny: &[String], trees: &[String]) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            allow: build_set(allow)?,
            deny: build_set(deny)?,
            trees: build_set(trees)?,
        })
    }

    /// Patterns for a jemdoc project: documents, the menu, the config file
    /// and everything under `static/`. The output tree is always denied so
    /// that compiling never feeds back into the watcher.
    pub fn for_layout(layout: &ProjectLayout) -> Result<Self> {
        let output = relative_glob(&layout.root, &layout.output_dir);
        let allow = vec![
            format!("**/*.{}", layout.extension),
            format!("**/{}", file_name(&layout.menu_file)),
            relative_glob(&layout.root, &layout.config_file),
            format!("{}/**", relative_glob(&layout.root, &layout.static_dir)),
        ];
        let deny = vec![format!("{output}/**"), format!("{output}/**/*.html")];
        let trees = vec![
            format!("{}/**", relative_glob(&layout.root, &layout.source_dir)),
            format!("{}/**", relative_glob(&layout.root, &layout.static_dir)),
        ];
        Self::new(&layout.root, &allow, &deny, &trees)
    }

    /// Whether a path passes, by pattern or as a tree.
    pub fn admits(&self, path: &Path) -> bool {
        self.allows(path) || self.allows_tree(path)
    }

    pub fn allows(&self, path: &Path) -> bool {
        self.relative(path)
            .is_some_and(|r| self.allow.is_match(&r) && !self.deny.is_match(&r))
    }

    /// A directory inside `src/` or `static/`, or a path there that no
    /// longer exists and may have been one. A moved or removed tree is
    /// reported only by its root.
    pub fn allows_tree(&self, path: &Path) -> bool {
        self.relative(path)
            .is_some_and(|r| self.trees.is_match(&r) && !self.deny.is_match(&r))
            && (path.is_dir() || !path.exists())
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        Some(relative.to_string_lossy().replace('\\', "/"))
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid watch pattern `{pattern}`"))?;
        builder.add(glob);
    }
    builder.build().context("failed to compile watch patterns")
}

fn relative_glob(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
