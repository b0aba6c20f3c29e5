//! Project layout: the four canonical directories and the files that
//! invalidate every page.
//!
//! ```text
//! <root>/
//!   src/            # source documents, MENU file
//!   html/           # compiled output (may be fully regenerated)
//!   static/         # assets mirrored verbatim into html/
//!   mysite.conf     # jemdoc configuration
//! ```

use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use thiserror::Error;

use crate::config::BuildConfig;
use crate::utils::path::{normalize_path, strip_prefix_ignore_case};

pub const SOURCE_DIR: &str = "src";
pub const OUTPUT_DIR: &str = "html";
pub const STATIC_DIR: &str = "static";

/// Extension of compiled documents.
pub const OUTPUT_EXTENSION: &str = "html";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{} is not a valid jemdoc-autoreload project: missing {missing}", root.display())]
    InvalidProject { root: PathBuf, missing: String },
}

/// Validated project paths. All paths are absolute.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub static_dir: PathBuf,
    pub config_file: PathBuf,
    pub menu_file: PathBuf,
    /// Source document extension, without the dot.
    pub extension: String,
}

impl ProjectLayout {
    /// Check that root, `src/`, `html/` and `static/` exist.
    ///
    /// Nothing is created: a missing directory is reported, never repaired.
    pub fn validate(root: &Path, build: &BuildConfig) -> Result<Self, ProjectError> {
        let invalid = |missing: String| ProjectError::InvalidProject {
            root: root.to_path_buf(),
            missing,
        };

        if !root.is_dir() {
            return Err(invalid("project directory".to_string()));
        }
        let root = normalize_path(root);

        for dir in [SOURCE_DIR, OUTPUT_DIR, STATIC_DIR] {
            if !root.join(dir).is_dir() {
                return Err(invalid(format!("`{dir}/` directory")));
            }
        }

        let source_dir = root.join(SOURCE_DIR);
        Ok(Self {
            output_dir: root.join(OUTPUT_DIR),
            static_dir: root.join(STATIC_DIR),
            config_file: root.join(&build.config),
            menu_file: source_dir.join(&build.menu),
            source_dir,
            extension: build.extension.clone(),
            root,
        })
    }

    // Predicates ignore ASCII case, matching the watch filter.

    pub fn is_config_file(&self, path: &Path) -> bool {
        same_path(path, &self.config_file)
    }

    pub fn is_menu_file(&self, path: &Path) -> bool {
        same_path(path, &self.menu_file)
    }

    /// A file under `src/` carrying the document extension.
    pub fn is_document(&self, path: &Path) -> bool {
        inside(path, &self.source_dir).is_some()
            && path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    /// A path strictly inside `static/`.
    pub fn is_static(&self, path: &Path) -> bool {
        inside(path, &self.static_dir).is_some()
    }

    /// Output path of a source document: same relative path under `html/`
    /// with the extension swapped.
    pub fn mirror_source(&self, source: &Path) -> Option<PathBuf> {
        let relative = inside(source, &self.source_dir)?;
        Some(self.output_dir.join(relative).with_extension(OUTPUT_EXTENSION))
    }

    /// Output path of a directory (or other non-document path) under
    /// `src/`: same relative path under `html/`, extension untouched.
    pub fn mirror_source_tree(&self, path: &Path) -> Option<PathBuf> {
        let relative = inside(path, &self.source_dir)?;
        Some(self.output_dir.join(relative))
    }

    /// Output path of a static asset: same relative path under `html/`.
    pub fn mirror_static(&self, asset: &Path) -> Option<PathBuf> {
        let relative = inside(asset, &self.static_dir)?;
        Some(self.output_dir.join(relative))
    }

    /// Whether an output file is still backed by a static asset or a
    /// source document.
    pub fn has_source(&self, output: &Path) -> bool {
        let Some(relative) = inside(output, &self.output_dir) else {
            return false;
        };
        if self.static_dir.join(relative).is_file() {
            return true;
        }
        relative
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(OUTPUT_EXTENSION))
            && self
                .source_dir
                .join(relative)
                .with_extension(&self.extension)
                .is_file()
    }

    /// Every source document, sorted.
    pub fn documents(&self) -> Vec<PathBuf> {
        let mut docs: Vec<_> = collect_files(&self.source_dir)
            .into_iter()
            .filter(|p| self.is_document(p))
            .collect();
        docs.sort();
        docs
    }

    /// Every static asset, sorted.
    pub fn static_assets(&self) -> Vec<PathBuf> {
        let mut assets = collect_files(&self.static_dir);
        assets.sort();
        assets
    }

    /// Path relative to the project root, for display.
    pub fn display<'a>(&self, path: &'a Path) -> std::path::Display<'a> {
        path.strip_prefix(&self.root).unwrap_or(path).display()
    }
}

/// Collect all files under `dir` recursively, skipping directories.
///
/// Symlinks to files count as files, since copying or compiling one reads
/// through the link. Symlinked directories are not descended into.
pub fn collect_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| {
            let file_type = e.file_type();
            file_type.is_file() || (file_type.is_symlink() && e.path().is_file())
        })
        .map(|e| e.path())
        .collect()
}

/// Non-empty relative path of `path` inside `dir`.
fn inside<'a>(path: &'a Path, dir: &Path) -> Option<&'a Path> {
    strip_prefix_ignore_case(path, dir).filter(|r| !r.as_os_str().is_empty())
}

fn same_path(a: &Path, b: &Path) -> bool {
    strip_prefix_ignore_case(a, b).is_some_and(|rest| rest.as_os_str().is_empty())
}
