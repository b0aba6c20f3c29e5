//! Per-action rebuild errors.
//!
//! None of these stop the watch session: the failed action is abandoned and
//! the next relevant filesystem event is the retry.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RebuildError {
    /// The compiler rejected a document. Its previous output is kept.
    #[error("compile failed: {}", path.display())]
    Compile { path: PathBuf, detail: String },

    #[error("failed to {op} {}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A created file matched no rule on the first pass, which means the
    /// watcher filter let through something it should have excluded.
    #[error("unrecognized file passed the watch filter: {}", path.display())]
    Unclassified { path: PathBuf },
}

impl RebuildError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { op, path, source }
    }

    /// Multi-line detail for the status display.
    pub fn detail(&self) -> String {
        match self {
            Self::Compile { detail, .. } => detail.clone(),
            Self::Io { source, .. } => source.to_string(),
            Self::Unclassified { .. } => String::new(),
        }
    }
}
