//! Watcher unit
//!
//! Subscribes to the project root and feeds debounced changes to the
//! rebuild planner, one event at a time, on its own thread.
//!
//! ```text
//! notify → WatchFilter (allow/deny globs) → Debouncer → RebuildPlanner
//! ```
//!
//! The watcher is created before the initial rebuild so that nothing
//! edited during that rebuild is lost: notify buffers into the channel
//! until the loop starts draining it.

mod debouncer;
mod filter;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};

use crate::{
    debug, log,
    rebuild::{self, RebuildPlanner},
    serve::Revision,
    supervisor::{ExitNotice, Unit, UnitHandle},
    utils::path::normalize_lossy,
};
use debouncer::Debouncer;
use filter::WatchFilter;

type NotifyResult = notify::Result<notify::Event>;

/// A subscribed watcher whose loop has not started yet.
pub struct Watcher {
    watcher: RecommendedWatcher,
    notify_rx: Receiver<NotifyResult>,
    filter: WatchFilter,
}

impl Watcher {
    /// Subscribe to the project root recursively.
    pub fn subscribe(planner: &RebuildPlanner) -> Result<Self> {
        let layout = planner.layout();
        let filter = WatchFilter::for_layout(layout)?;

        let (notify_tx, notify_rx) = channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&layout.root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", layout.root.display()))?;

        debug!("watch"; "watching {}", layout.root.display());
        Ok(Self {
            watcher,
            notify_rx,
            filter,
        })
    }

    /// Start the event loop on a dedicated thread.
    pub fn spawn(
        self,
        planner: Arc<RebuildPlanner>,
        revision: Revision,
        exit: ExitNotice,
    ) -> Result<WatcherHandle> {
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        let thread = thread::Builder::new()
            .name("watcher".into())
            .spawn(move || {
                let _exit = exit.arm(Unit::Watcher);
                self.run(&planner, &revision, &shutdown_rx);
            })
            .context("failed to spawn watcher thread")?;

        Ok(WatcherHandle {
            shutdown_tx,
            thread,
        })
    }

    fn run(self, planner: &RebuildPlanner, revision: &Revision, shutdown_rx: &Receiver<()>) {
        // keeps the subscription alive for the lifetime of the loop
        let Self {
            watcher: _watcher,
            notify_rx,
            filter,
        } = self;
        let mut debouncer = Debouncer::new();

        loop {
            channel::select! {
                recv(shutdown_rx) -> _ => break,
                recv(notify_rx) -> msg => match msg {
                    Ok(Ok(mut event)) => {
                        event.paths.retain(|p| filter.admits(&normalize_lossy(p)));
                        if !event.paths.is_empty() {
                            debouncer.add_event(&event);
                        }
                    }
                    Ok(Err(e)) => log!("watch"; "notify error: {e}"),
                    Err(_) => {
                        log!("error"; "file watcher disconnected");
                        break;
                    }
                },
                default(debouncer.sleep_duration()) => {
                    process_changes(&mut debouncer, planner, revision);
                }
            }
        }
        debug!("watch"; "stopped");
    }
}

/// Apply every ready change in arrival order.
///
/// The revision is bumped once per batch that touched the output tree.
fn process_changes(debouncer: &mut Debouncer, planner: &RebuildPlanner, revision: &Revision) {
    let Some(events) = debouncer.take_if_ready() else {
        return;
    };

    let mut mutated = false;
    for event in &events {
        let result = planner.handle(event);
        rebuild::report(planner.layout(), &result);
        mutated |= result.as_ref().is_ok_and(rebuild::Outcome::mutated);
    }
    if mutated {
        revision.bump();
    }
}

/// Owner side of a running watcher.
pub struct WatcherHandle {
    shutdown_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl UnitHandle for WatcherHandle {
    /// Ask the loop to stop. An action already in progress runs to completion.
    fn stop(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    fn join(self: Box<Self>) {
        if self.thread.join().is_err() {
            log!("error"; "watcher thread panicked");
        }
    }
}
