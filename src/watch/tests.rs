use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use super::debouncer::{DEBOUNCE_MS, Debouncer};
use super::process_changes;
use crate::compiler::DocumentCompiler;
use crate::config::BuildConfig;
use crate::project::ProjectLayout;
use crate::rebuild::{ChangeKind, RebuildPlanner};
use crate::serve::Revision;
use crate::utils::path::normalize_path;

fn make_event(paths: Vec<&Path>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(Path::to_path_buf).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn rename_from_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Name(
        notify::event::RenameMode::From,
    ))
}

fn folder_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::Folder)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

/// Pretend the debounce window has already elapsed.
fn expire(debouncer: &mut Debouncer) {
    let past = Instant::now().checked_sub(Duration::from_millis(DEBOUNCE_MS + 50));
    debouncer.last_event = past.or(debouncer.last_event);
}

fn temp_files(names: &[&str]) -> (TempDir, Vec<PathBuf>) {
    let temp = TempDir::new().unwrap();
    let root = normalize_path(temp.path());
    let paths = names
        .iter()
        .map(|name| {
            let path = root.join(name);
            fs::write(&path, name).unwrap();
            path
        })
        .collect();
    (temp, paths)
}

#[test]
fn test_debouncer_empty() {
    let mut debouncer = Debouncer::new();
    assert!(!debouncer.is_ready());
    assert!(debouncer.take_if_ready().is_none());
    assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
}

#[test]
fn test_not_ready_inside_window() {
    let (_temp, paths) = temp_files(&["a.jemdoc"]);
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&paths[0]], modify_kind()));

    assert!(!debouncer.is_ready());
    assert!(debouncer.take_if_ready().is_none());
    let dur = debouncer.sleep_duration();
    assert!(dur <= Duration::from_millis(DEBOUNCE_MS));
    assert!(dur >= Duration::from_millis(DEBOUNCE_MS - 50));
}

#[test]
fn test_events_keep_arrival_order() {
    let (_temp, paths) = temp_files(&["c.jemdoc", "a.jemdoc", "b.jemdoc"]);
    let mut debouncer = Debouncer::new();
    for path in &paths {
        debouncer.add_event(&make_event(vec![path], modify_kind()));
    }
    // a repeat does not move a path to the back
    debouncer.add_event(&make_event(vec![&paths[0]], modify_kind()));
    expire(&mut debouncer);

    let events = debouncer.take_if_ready().unwrap();
    let order: Vec<_> = events.iter().map(|e| e.path.clone()).collect();
    assert_eq!(order, paths);
    assert!(events.iter().all(|e| e.kind == ChangeKind::Modified));
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_metadata_only_changes_ignored() {
    let (_temp, paths) = temp_files(&["a.jemdoc"]);
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&paths[0]], metadata_kind()));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_temp_files_ignored() {
    let mut debouncer = Debouncer::new();
    for name in [
        "/site/src/.a.jemdoc.swp",
        "/site/src/a.jemdoc~",
        "/site/src/.#a.jemdoc",
        "/site/src/4913",
        "/site/html/.a.html.partial",
    ] {
        debouncer.add_event(&make_event(vec![Path::new(name)], modify_kind()));
    }
    assert!(debouncer.changes.is_empty());
}

#[test]
fn test_dotfiles_and_backups_are_kept() {
    let mut debouncer = Debouncer::new();
    for name in [
        "/site/static/.nojekyll",
        "/site/static/.well-known/security.txt",
        "/site/static/data.bak",
        "/site/static/report.tmp",
    ] {
        debouncer.add_event(&make_event(vec![Path::new(name)], modify_kind()));
    }
    assert_eq!(debouncer.changes.len(), 4);
}

#[test]
fn test_dedup_first_event_wins() {
    let (_temp, paths) = temp_files(&["a.jemdoc"]);
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&paths[0]], create_kind()));
    debouncer.add_event(&make_event(vec![&paths[0]], modify_kind()));
    expire(&mut debouncer);

    let events = debouncer.take_if_ready().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::Created);
}

#[test]
fn test_created_then_deleted_is_dropped() {
    let temp = TempDir::new().unwrap();
    let path = normalize_path(temp.path()).join("flash.jemdoc");
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&path], create_kind()));
    debouncer.add_event(&make_event(vec![&path], remove_kind()));
    expire(&mut debouncer);

    assert!(debouncer.take_if_ready().is_none());
    // the window is closed, so the loop goes back to sleeping
    assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
}

#[test]
fn test_delete_of_existing_file_becomes_modify() {
    // rename-based editor saves report a delete for a file that is back
    let (_temp, paths) = temp_files(&["a.jemdoc"]);
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&paths[0]], remove_kind()));
    expire(&mut debouncer);

    let events = debouncer.take_if_ready().unwrap();
    assert_eq!(events[0].kind, ChangeKind::Modified);
}

#[test]
fn test_modify_of_missing_file_becomes_delete() {
    let (_temp, paths) = temp_files(&["a.jemdoc"]);
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&paths[0]], modify_kind()));
    fs::remove_file(&paths[0]).unwrap();
    expire(&mut debouncer);

    let events = debouncer.take_if_ready().unwrap();
    assert_eq!(events[0].kind, ChangeKind::Deleted);
    assert_eq!(events[0].path, paths[0]);
}

#[test]
fn test_empty_directory_yields_nothing() {
    let temp = TempDir::new().unwrap();
    let dir = normalize_path(temp.path()).join("sub");
    fs::create_dir(&dir).unwrap();
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&dir], modify_kind()));
    expire(&mut debouncer);

    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_directory_expands_to_its_files() {
    let temp = TempDir::new().unwrap();
    let dir = normalize_path(temp.path()).join("img");
    fs::create_dir_all(dir.join("icons")).unwrap();
    fs::write(dir.join("logo.png"), "png").unwrap();
    fs::write(dir.join("icons").join("a.svg"), "svg").unwrap();
    fs::write(dir.join(".a.svg.swp"), "swap").unwrap();

    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&dir.join("logo.png")], modify_kind()));
    debouncer.add_event(&make_event(vec![&dir], folder_kind()));
    expire(&mut debouncer);

    let events = debouncer.take_if_ready().unwrap();
    let paths: Vec<_> = events.iter().map(|e| e.path.clone()).collect();
    // a file already reported keeps its place and is not repeated
    assert_eq!(paths, [dir.join("logo.png"), dir.join("icons").join("a.svg")]);
    assert_eq!(events[1].kind, ChangeKind::Created);
}

struct CopyCompiler;

impl DocumentCompiler for CopyCompiler {
    fn compile(&self, source: &Path, output: &Path, _config: &Path) -> anyhow::Result<()> {
        fs::copy(source, output)?;
        Ok(())
    }
}

fn make_planner() -> (TempDir, Arc<RebuildPlanner>) {
    let temp = TempDir::new().unwrap();
    for dir in ["src", "html", "static"] {
        fs::create_dir_all(temp.path().join(dir)).unwrap();
    }
    let layout = ProjectLayout::validate(temp.path(), &BuildConfig::default()).unwrap();
    let planner = RebuildPlanner::new(Arc::new(layout), Arc::new(CopyCompiler));
    (temp, Arc::new(planner))
}

#[test]
fn test_process_changes_bumps_revision_on_mutation() {
    let (_temp, planner) = make_planner();
    let layout = planner.layout();
    let source = layout.source_dir.join("a.jemdoc");
    fs::write(&source, "= A").unwrap();

    let revision = Revision::default();
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&source], create_kind()));
    expire(&mut debouncer);

    process_changes(&mut debouncer, &planner, &revision);
    assert_eq!(revision.current(), 1);
    assert_eq!(
        fs::read_to_string(layout.output_dir.join("a.html")).unwrap(),
        "= A"
    );
}

#[test]
fn test_process_changes_without_mutation_keeps_revision() {
    let (_temp, planner) = make_planner();
    let layout = planner.layout();
    let gone = layout.source_dir.join("gone.jemdoc");
    fs::write(&gone, "x").unwrap();

    let revision = Revision::default();
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&gone], modify_kind()));
    fs::remove_file(&gone).unwrap();
    expire(&mut debouncer);

    // becomes a delete of an output that never existed
    process_changes(&mut debouncer, &planner, &revision);
    assert_eq!(revision.current(), 0);
}

#[test]
fn test_directory_moved_in_is_mirrored() {
    let (temp, planner) = make_planner();
    let layout = planner.layout();
    let outside = temp.path().join("incoming");
    fs::create_dir_all(outside.join("icons")).unwrap();
    fs::write(outside.join("logo.png"), "png").unwrap();
    fs::write(outside.join("icons").join("a.svg"), "svg").unwrap();
    fs::create_dir_all(temp.path().join("drafts")).unwrap();
    fs::write(temp.path().join("drafts").join("c.jemdoc"), "= C").unwrap();

    fs::rename(&outside, layout.static_dir.join("img")).unwrap();
    fs::rename(temp.path().join("drafts"), layout.source_dir.join("drafts")).unwrap();

    let revision = Revision::default();
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&layout.static_dir.join("img")], folder_kind()));
    debouncer.add_event(&make_event(vec![&layout.source_dir.join("drafts")], folder_kind()));
    expire(&mut debouncer);

    process_changes(&mut debouncer, &planner, &revision);
    assert_eq!(revision.current(), 1);
    assert!(layout.output_dir.join("img").join("logo.png").is_file());
    assert!(layout.output_dir.join("img").join("icons").join("a.svg").is_file());
    assert_eq!(
        fs::read_to_string(layout.output_dir.join("drafts").join("c.html")).unwrap(),
        "= C"
    );
}

#[test]
fn test_directory_moved_out_is_removed() {
    let (temp, planner) = make_planner();
    let layout = planner.layout();
    fs::create_dir_all(layout.static_dir.join("img")).unwrap();
    fs::write(layout.static_dir.join("img").join("a.png"), "png").unwrap();
    fs::create_dir_all(layout.source_dir.join("sub")).unwrap();
    fs::write(layout.source_dir.join("sub").join("b.jemdoc"), "= B").unwrap();
    planner.rebuild_all().unwrap();

    fs::rename(layout.static_dir.join("img"), temp.path().join("img")).unwrap();
    fs::rename(layout.source_dir.join("sub"), temp.path().join("sub")).unwrap();

    let revision = Revision::default();
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&layout.static_dir.join("img")], rename_from_kind()));
    debouncer.add_event(&make_event(vec![&layout.source_dir.join("sub")], rename_from_kind()));
    expire(&mut debouncer);

    process_changes(&mut debouncer, &planner, &revision);
    assert_eq!(revision.current(), 1);
    assert!(!layout.output_dir.join("img").exists());
    assert!(!layout.output_dir.join("sub").exists());
}

#[test]
fn test_dotfile_asset_is_synced() {
    let (_temp, planner) = make_planner();
    let layout = planner.layout();
    let nojekyll = layout.static_dir.join(".nojekyll");
    fs::write(&nojekyll, "").unwrap();

    let revision = Revision::default();
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec![&nojekyll], create_kind()));
    expire(&mut debouncer);

    process_changes(&mut debouncer, &planner, &revision);
    assert!(layout.output_dir.join(".nojekyll").is_file());
}
