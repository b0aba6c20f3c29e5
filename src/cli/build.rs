//! `build`: regenerate `html/` once and exit.

use std::path::Path;

use anyhow::{Result, bail};

use super::common::open_project;
use crate::rebuild;

/// Run one full rebuild. Fails when any document did not compile.
pub fn build_site(path: &Path) -> Result<()> {
    let project = open_project(path)?;
    let planner = project.planner.with_progress(true);

    let report = planner.rebuild_all()?;
    rebuild::report_rebuild(&report);

    if !report.failures.is_empty() {
        bail!("{} document(s) failed to compile", report.failures.len());
    }
    Ok(())
}
