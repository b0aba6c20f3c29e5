//! Session supervisor.
//!
//! Owns the watcher and file server units and decides when the session
//! ends: on Ctrl+C, or as soon as either unit stops on its own. Either way
//! both units are stopped and joined before returning.

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

use crate::{debug, log};

/// A background unit of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Watcher,
    Server,
}

impl Unit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Watcher => "watcher",
            Self::Server => "server",
        }
    }
}

/// What woke the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Exited(Unit),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("file watcher stopped unexpectedly")]
    WatcherDied,
    #[error("file server stopped unexpectedly")]
    ServerDied,
}

impl From<Unit> for SessionError {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Watcher => Self::WatcherDied,
            Unit::Server => Self::ServerDied,
        }
    }
}

/// Stop/join interface of a running unit.
pub trait UnitHandle: Send {
    /// Request a stop. Must not block.
    fn stop(&self);
    /// Wait for the unit's thread to finish.
    fn join(self: Box<Self>);
}

/// Given to a unit so it can report that its thread ended.
#[derive(Clone)]
pub struct ExitNotice(Sender<Signal>);

impl ExitNotice {
    pub fn new(tx: Sender<Signal>) -> Self {
        Self(tx)
    }

    /// Returns a guard that reports `unit` as exited when dropped, so a
    /// unit thread that returns or unwinds is always noticed.
    pub fn arm(self, unit: Unit) -> ExitGuard {
        ExitGuard { unit, tx: self.0 }
    }
}

pub struct ExitGuard {
    unit: Unit,
    tx: Sender<Signal>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(Signal::Exited(self.unit));
    }
}

pub struct Supervisor {
    signal_tx: Sender<Signal>,
    signal_rx: Receiver<Signal>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        let (signal_tx, signal_rx) = channel::unbounded();
        Self {
            signal_tx,
            signal_rx,
        }
    }

    /// Route Ctrl+C into the supervisor. Can only be installed once per
    /// process.
    pub fn handle_interrupts(&self) -> Result<()> {
        let tx = self.signal_tx.clone();
        ctrlc::set_handler(move || {
            let _ = tx.send(Signal::Interrupt);
        })
        .context("failed to set Ctrl+C handler")
    }

    pub fn exit_notice(&self) -> ExitNotice {
        ExitNotice::new(self.signal_tx.clone())
    }

    /// Block until the session ends, then stop and join every unit.
    ///
    /// An interrupt is a clean exit. A unit exiting on its own is an error
    /// naming that unit.
    pub fn run(self, units: Vec<(Unit, Box<dyn UnitHandle>)>) -> Result<(), SessionError> {
        // the supervisor holds a sender itself, so recv only fails if that is gone
        let signal = self.signal_rx.recv().unwrap_or(Signal::Interrupt);

        match signal {
            Signal::Interrupt => log!("serve"; "shutting down..."),
            Signal::Exited(unit) => log!("error"; "{} stopped, shutting down", unit.label()),
        }

        for (_, handle) in &units {
            handle.stop();
        }
        for (unit, handle) in units {
            handle.join();
            debug!("serve"; "{} joined", unit.label());
        }

        match signal {
            Signal::Interrupt => Ok(()),
            Signal::Exited(unit) => Err(unit.into()),
        }
    }
}
