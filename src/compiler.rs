//! Document compilation: one source document in, one HTML file out.
//!
//! The markup itself is owned by the external `jemdoc` program. This module
//! only knows how to invoke it and how to make its output appear atomically.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};

use crate::utils::exec::{Cmd, FilterRule};

/// Renders a source document to HTML.
///
/// Implementations must either fully write `output` or leave it untouched.
pub trait DocumentCompiler: Send + Sync {
    fn compile(&self, source: &Path, output: &Path, config: &Path) -> Result<()>;
}

/// Python warnings printed by older jemdoc releases on every run.
static JEMDOC_FILTER: FilterRule =
    FilterRule::new(&["DeprecationWarning", "SyntaxWarning", "warnings.warn", "import "]);

/// Runs the configured jemdoc command: `<command...> -o <output> -c <config> <source>`.
pub struct JemdocCompiler {
    command: Vec<String>,
}

impl JemdocCompiler {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl DocumentCompiler for JemdocCompiler {
    fn compile(&self, source: &Path, output: &Path, config: &Path) -> Result<()> {
        let staging = staging_path(output);
        let cwd = source.parent().unwrap_or(Path::new("."));

        let mut cmd = Cmd::from_slice(&self.command)
            .arg("-o")
            .arg(&staging)
            .cwd(cwd)
            .filter(&JEMDOC_FILTER);
        // A project without a config file still renders with jemdoc's defaults.
        if config.is_file() {
            cmd = cmd.arg("-c").arg(config);
        }

        let result = cmd.arg(source).run();
        if let Err(e) = result {
            discard(&staging);
            return Err(e);
        }
        if !staging.is_file() {
            bail!("compiler exited successfully but wrote no output");
        }
        publish(&staging, output)
    }
}

/// Sibling temp path the compiler writes to before the final rename.
pub fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{name}.partial"))
}

/// Move a fully written staging file over the real output.
pub fn publish(staging: &Path, output: &Path) -> Result<()> {
    let result = fs::rename(staging, output);
    if result.is_err() {
        discard(staging);
    }
    result.with_context(|| format!("failed to move compiled output to {}", output.display()))
}

fn discard(staging: &Path) {
    if staging.exists() {
        let _ = fs::remove_file(staging);
    }
}
