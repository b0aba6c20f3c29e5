//! `serve`: build once, then serve `html/` and rebuild on change.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use super::{ServeArgs, common::open_project};
use crate::{
    log,
    rebuild::{self, Outcome},
    serve::{FileServer, Revision},
    supervisor::{Supervisor, Unit, UnitHandle},
    watch::Watcher,
};

pub fn serve_site(path: &Path, args: &ServeArgs) -> Result<()> {
    let project = open_project(path)?;
    let mut settings = project.settings;
    settings.apply_serve_args(args);
    let serve = &settings.serve;

    let supervisor = Supervisor::new();
    supervisor.handle_interrupts()?;

    let planner = Arc::new(project.planner.with_progress(true));
    let layout = planner.layout();

    // Subscribe first: edits made during the initial rebuild are queued.
    let watcher = serve.watch.then(|| Watcher::subscribe(&planner)).transpose()?;

    // A broken initial rebuild is reported, not fatal: fixing the source
    // triggers the next one.
    let initial = planner.rebuild_all().map(Outcome::Rebuilt);
    rebuild::report(layout, &initial);

    let revision = Revision::default();
    let server = FileServer::bind(
        serve.interface,
        serve.port,
        layout.output_dir.clone(),
        serve.live_reload,
        revision.clone(),
    )?;

    log!("serve"; "http://{}", server.addr());
    let server = server.spawn(supervisor.exit_notice())?;
    let mut units: Vec<(Unit, Box<dyn UnitHandle>)> = Vec::with_capacity(2);
    units.push((Unit::Server, Box::new(server)));
    if let Some(watcher) = watcher {
        let handle = watcher.spawn(Arc::clone(&planner), revision, supervisor.exit_notice())?;
        units.push((Unit::Watcher, Box::new(handle)));
        log!("watch"; "watching {} for changes", layout.root.display());
    }

    supervisor.run(units)?;
    Ok(())
}
