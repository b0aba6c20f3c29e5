//! Project loading shared by every command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    compiler::JemdocCompiler,
    config::{SETTINGS_FILE, Settings},
    debug,
    project::ProjectLayout,
    rebuild::RebuildPlanner,
    utils::path::normalize_path,
};

/// A validated project ready to rebuild.
pub struct Project {
    pub settings: Settings,
    pub planner: RebuildPlanner,
}

/// Read settings, validate the directory layout and set up the planner.
///
/// Nothing on disk is created or changed.
pub fn open_project(path: &Path) -> Result<Project> {
    let root = normalize_path(path);
    let settings = Settings::load(&root)
        .with_context(|| format!("failed to load {}", root.join(SETTINGS_FILE).display()))?;
    let layout = ProjectLayout::validate(&root, &settings.build)?;
    debug!("serve"; "project root {}", layout.root.display());

    let compiler = JemdocCompiler::new(settings.build.compiler.clone());
    let planner = RebuildPlanner::new(Arc::new(layout), Arc::new(compiler));
    Ok(Project { settings, planner })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_valid_project() {
        let temp = TempDir::new().unwrap();
        for dir in ["src", "html", "static"] {
            fs::create_dir(temp.path().join(dir)).unwrap();
        }
        fs::write(temp.path().join(SETTINGS_FILE), "[serve]\nport = 9001\n").unwrap();

        let project = open_project(temp.path()).unwrap();
        assert_eq!(project.settings.serve.port, 9001);
        assert_eq!(
            project.planner.layout().root,
            normalize_path(temp.path())
        );
    }

    #[test]
    fn test_missing_directory_is_reported_and_not_created() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::create_dir(temp.path().join("static")).unwrap();

        let err = open_project(temp.path()).err().unwrap();
        assert!(format!("{err:#}").contains("html"));
        assert!(!temp.path().join("html").exists());
    }

    #[test]
    fn test_invalid_settings_are_fatal() {
        let temp = TempDir::new().unwrap();
        for dir in ["src", "html", "static"] {
            fs::create_dir(temp.path().join(dir)).unwrap();
        }
        fs::write(temp.path().join(SETTINGS_FILE), "[serve]\nport = 0\n").unwrap();

        let err = open_project(temp.path()).err().unwrap();
        assert!(format!("{err:#}").contains(SETTINGS_FILE));
    }
}
