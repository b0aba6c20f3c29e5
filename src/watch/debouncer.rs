use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::project::collect_files;
use crate::rebuild::{ChangeKind, RebuildEvent};
use crate::utils::path::normalize_lossy;

pub(super) const DEBOUNCE_MS: u64 = 300;

/// Collapses bursts of notify events into one change per path.
///
/// Paths are released in the order they were first seen.
pub(super) struct Debouncer {
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    pub(super) order: Vec<PathBuf>,
    pub(super) last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            order: Vec::new(),
            last_event: None,
        }
    }

    /// Record a notify event.
    ///
    /// - Deleted then Created/Modified → the restore wins
    /// - Modified then Deleted → Deleted
    /// - Created then Deleted → dropped
    /// - anything else → first event wins
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Deleted,
            EventKind::Modify(modify) => {
                // mtime/chmod noise
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.record(normalize_lossy(path), kind);
        }
    }

    fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        if let Some(&existing) = self.changes.get(&path) {
            match (existing, kind) {
                (ChangeKind::Deleted, ChangeKind::Created | ChangeKind::Modified) => {
                    crate::debug!("watch"; "restore deleted->{}: {}", kind.label(), path.display());
                    self.changes.insert(path, kind);
                }
                (ChangeKind::Modified, ChangeKind::Deleted) => {
                    crate::debug!("watch"; "upgrade modified->deleted: {}", path.display());
                    self.changes.insert(path, ChangeKind::Deleted);
                }
                (ChangeKind::Created, ChangeKind::Deleted) => {
                    crate::debug!("watch"; "discard created+deleted: {}", path.display());
                    self.changes.remove(&path);
                }
                _ => return,
            }
            self.last_event = Some(Instant::now());
            return;
        }

        self.order.push(path.clone());
        self.changes.insert(path, kind);
        self.last_event = Some(Instant::now());
    }

    /// Take the collected changes once the debounce window has passed.
    ///
    /// A directory that exists now stands for every file inside it: notify
    /// reports a tree moved into place as one event for its root.
    pub(super) fn take_if_ready(&mut self) -> Option<Vec<RebuildEvent>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;

        let mut changes = std::mem::take(&mut self.changes);
        let mut seen = FxHashSet::default();
        let mut events = Vec::new();
        for path in std::mem::take(&mut self.order) {
            let Some(kind) = changes.remove(&path) else {
                continue;
            };
            if path.is_dir() {
                let mut files = collect_files(&path);
                files.sort();
                for file in files {
                    if !is_temp_file(&file) && seen.insert(file.clone()) {
                        events.push(RebuildEvent::new(ChangeKind::Created, file));
                    }
                }
                continue;
            }
            if let Some(kind) = correct_by_existence(kind, &path)
                && seen.insert(path.clone())
            {
                events.push(RebuildEvent::new(kind, path));
            }
        }

        (!events.is_empty()).then_some(events)
    }

    pub(super) fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Time until the pending batch may be released.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };
        Duration::from_millis(DEBOUNCE_MS)
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Reconcile a change kind with what is on disk now.
///
/// Editors that save by rename report a delete for a file that still
/// exists, and short-lived files report a create for a file already gone.
fn correct_by_existence(kind: ChangeKind, path: &Path) -> Option<ChangeKind> {
    let exists = path.exists();
    match kind {
        ChangeKind::Created if !exists => {
            crate::debug!("watch"; "discard created (gone): {}", path.display());
            None
        }
        ChangeKind::Modified if !exists => Some(ChangeKind::Deleted),
        ChangeKind::Deleted if exists => Some(ChangeKind::Modified),
        _ => Some(kind),
    }
}

/// Editor swap, lock and backup files, plus our own compile staging files.
///
/// Dotfiles in general are real assets (`.nojekyll`, `.well-known/`) and
/// pass through.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "swp" | "swo" | "swx" | "partial")
        || name.ends_with('~')
        || name.starts_with(".#")
        // vim probes directory writability with this name
        || name == "4913"
}
