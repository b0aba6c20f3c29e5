//! Incremental rebuild engine.
//!
//! Keeps `html/` a mirror of `src/` (compiled) and `static/` (copied):
//!
//! ```text
//! RebuildEvent → classify (pure) → Action → execute (effectful) → Outcome
//! ```
//!
//! Per-document actions only ever touch their own mirrored output path.
//! Config and menu changes affect every page, so they force a full rebuild
//! instead of any attempt at partial invalidation.

mod action;
mod error;
pub mod sync;


pub use action::{Action, ChangeKind, RebuildEvent, classify};
pub use error::RebuildError;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
    compiler::DocumentCompiler,
    debug,
    logger::{self, ProgressLine},
    log,
    project::ProjectLayout,
};

/// Result of one executed action.
#[derive(Debug)]
pub enum Outcome {
    Rebuilt(RebuildReport),
    Compiled(PathBuf),
    Copied(PathBuf),
    /// `true` when a file was removed, `false` when it was already absent.
    Deleted(PathBuf, bool),
    Ignored,
}

impl Outcome {
    /// Whether the output tree may have changed.
    pub fn mutated(&self) -> bool {
        match self {
            Self::Rebuilt(_) | Self::Compiled(_) | Self::Copied(_) => true,
            Self::Deleted(_, removed) => *removed,
            Self::Ignored => false,
        }
    }
}

/// Summary of a full rebuild.
#[derive(Debug, Default)]
pub struct RebuildReport {
    pub documents: usize,
    pub assets: usize,
    /// Documents that failed to compile. The rest of the tree is complete.
    pub failures: Vec<RebuildError>,
}

/// Classifies events and applies the resulting actions to `html/`.
pub struct RebuildPlanner {
    layout: Arc<ProjectLayout>,
    compiler: Arc<dyn DocumentCompiler>,
    /// One action at a time, so a full rebuild never interleaves with a
    /// per-document write.
    lock: Mutex<()>,
    /// Cleared by the first call to `handle`.
    first_pass: AtomicBool,
    progress: bool,
}

impl RebuildPlanner {
    pub fn new(layout: Arc<ProjectLayout>, compiler: Arc<dyn DocumentCompiler>) -> Self {
        Self {
            layout,
            compiler,
            lock: Mutex::new(()),
            first_pass: AtomicBool::new(true),
            progress: false,
        }
    }

    /// Show a progress line during full rebuilds.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Classify and execute one event.
    ///
    /// An unrecognized *created* file on the very first pass is reported as
    /// [`RebuildError::Unclassified`]; afterwards unrecognized files are inert.
    pub fn handle(&self, event: &RebuildEvent) -> Result<Outcome, RebuildError> {
        let first_pass = self.first_pass.swap(false, Ordering::SeqCst);
        let action = classify(event, &self.layout);
        debug!("rebuild"; "{} {} -> {}", event.kind.label(), self.layout.display(&event.path), action.label());

        if first_pass && action == Action::Ignore && event.kind == ChangeKind::Created {
            return Err(RebuildError::Unclassified {
                path: event.path.clone(),
            });
        }
        self.execute(action)
    }

    /// Apply an action to the output tree.
    pub fn execute(&self, action: Action) -> Result<Outcome, RebuildError> {
        let _guard = self.lock.lock();
        match action {
            Action::FullRebuild => self.full_rebuild().map(Outcome::Rebuilt),
            Action::CompileOne(source) => {
                self.compile_one(&source)?;
                Ok(Outcome::Compiled(source))
            }
            Action::CopyOne(asset) => {
                self.copy_one(&asset)?;
                Ok(Outcome::Copied(asset))
            }
            Action::DeleteOutput(output) => {
                let removed = if output.is_dir() {
                    self.prune(&output)? > 0
                } else {
                    sync::delete_one(&output, &self.layout.output_dir)?
                };
                Ok(Outcome::Deleted(output, removed))
            }
            Action::PruneOutput(output) => {
                let removed = self.prune(&output)? > 0;
                Ok(Outcome::Deleted(output, removed))
            }
            Action::Ignore => Ok(Outcome::Ignored),
        }
    }

    /// Run a full rebuild outside of event handling.
    pub fn rebuild_all(&self) -> Result<RebuildReport, RebuildError> {
        let _guard = self.lock.lock();
        self.full_rebuild()
    }

    /// Regenerate `html/` from scratch.
    ///
    /// Document compile failures are collected in the report and do not stop
    /// the rebuild. Any I/O failure aborts it.
    fn full_rebuild(&self) -> Result<RebuildReport, RebuildError> {
        let layout = &self.layout;
        sync::clear_dir(&layout.output_dir)?;

        let documents = layout.documents();
        let assets = layout.static_assets();
        let progress = self
            .progress
            .then(|| ProgressLine::new(&[("documents", documents.len()), ("static", assets.len())]));

        let errors: Vec<RebuildError> = documents
            .par_iter()
            .filter_map(|source| {
                let result = self.compile_one(source);
                if let Some(progress) = &progress {
                    progress.inc("documents");
                }
                result.err()
            })
            .collect();

        // Anything other than a compile failure leaves the tree unusable.
        let (failures, fatal): (Vec<_>, Vec<_>) = errors
            .into_iter()
            .partition(|e| matches!(e, RebuildError::Compile { .. }));
        if let Some(err) = fatal.into_iter().next() {
            return Err(err);
        }

        let copied = sync::copy_all(&layout.static_dir, &layout.output_dir, || {
            if let Some(progress) = &progress {
                progress.inc("static");
            }
        })?;

        if let Some(progress) = progress {
            progress.finish();
        }

        Ok(RebuildReport {
            documents: documents.len() - failures.len(),
            assets: copied,
            failures,
        })
    }

    fn compile_one(&self, source: &Path) -> Result<(), RebuildError> {
        let layout = &self.layout;
        let Some(output) = layout.mirror_source(source) else {
            return Ok(());
        };
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(RebuildError::io("create", parent))?;
        }

        self.compiler
            .compile(source, &output, &layout.config_file)
            .map_err(|e| RebuildError::Compile {
                path: source.to_path_buf(),
                detail: format!("{e:#}"),
            })
    }

    /// Drop every output under `dir` that no source backs any more.
    fn prune(&self, dir: &Path) -> Result<usize, RebuildError> {
        let layout = &self.layout;
        sync::prune_orphans(dir, &layout.output_dir, |output| !layout.has_source(output))
    }

    fn copy_one(&self, asset: &Path) -> Result<(), RebuildError> {
        let Some(output) = self.layout.mirror_static(asset) else {
            return Ok(());
        };
        if asset.is_dir() {
            return sync::copy_all(asset, &output, || {}).map(|_| ());
        }
        sync::copy_one(asset, &output)
    }
}

/// Print the result of an action in the watch status area.
pub fn report(layout: &ProjectLayout, result: &Result<Outcome, RebuildError>) {
    match result {
        Ok(Outcome::Rebuilt(report)) => report_rebuild(report),
        Ok(Outcome::Compiled(path)) => {
            logger::status_success(&format!("compiled {}", layout.display(path)));
        }
        Ok(Outcome::Copied(path)) => {
            logger::status_success(&format!("copied {}", layout.display(path)));
        }
        Ok(Outcome::Deleted(path, true)) => {
            logger::status_success(&format!("removed {}", layout.display(path)));
        }
        Ok(Outcome::Deleted(path, false)) => {
            debug!("rebuild"; "already absent: {}", layout.display(path));
        }
        Ok(Outcome::Ignored) => {}
        Err(e @ RebuildError::Unclassified { .. }) => logger::status_warning(&e.to_string()),
        Err(e) => logger::status_error(&e.to_string(), &e.detail()),
    }
}

/// Print a full rebuild summary, including every failed document.
pub fn report_rebuild(report: &RebuildReport) {
    if report.failures.is_empty() {
        log!("rebuild"; "compiled {} documents, copied {} static files", report.documents, report.assets);
        return;
    }

    log!(
        "rebuild";
        "compiled {} documents, copied {} static files, {} failed",
        report.documents,
        report.assets,
        report.failures.len()
    );
    for failure in &report.failures {
        log!("error"; "{}\n{}", failure, failure.detail());
    }
}
