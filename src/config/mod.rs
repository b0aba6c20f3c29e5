//! Server settings from the optional `autoreload.toml`.
//!
//! The file lives next to `mysite.conf` at the project root. Every field
//! has a default, so a project without the file behaves exactly like one
//! with an empty file.
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"   # use 0.0.0.0 for LAN access
//! port = 8000
//! watch = true              # rebuild on file changes
//! live_reload = true        # inject the reload script into HTML pages
//!
//! [build]
//! compiler = ["jemdoc"]     # e.g. ["python3", "-m", "jemdoc"]
//! config = "mysite.conf"    # jemdoc config, relative to the project root
//! menu = "MENU"             # menu file inside src/
//! extension = "jemdoc"      # source document extension
//! ```
//!
//! Changes to this file are only picked up on restart. It is not part of
//! the watched set.

mod error;

pub use error::ConfigError;

use crate::{cli::ServeArgs, log};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

/// Settings file name, resolved against the project root.
pub const SETTINGS_FILE: &str = "autoreload.toml";

/// Root of `autoreload.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub serve: ServeConfig,
    pub build: BuildConfig,
}

/// `[serve]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    pub interface: IpAddr,
    /// First port to try; the next nine are tried when it is taken.
    pub port: u16,
    /// Watch the project and rebuild on change.
    pub watch: bool,
    /// Inject the polling reload script into served HTML.
    pub live_reload: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            watch: true,
            live_reload: true,
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Compiler command; output, config and source arguments are appended.
    pub compiler: Vec<String>,
    /// jemdoc configuration file, relative to the project root.
    pub config: PathBuf,
    /// Menu file name inside the source directory.
    pub menu: String,
    /// Source document extension, without the dot.
    pub extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: vec!["jemdoc".to_string()],
            config: PathBuf::from("mysite.conf"),
            menu: "MENU".to_string(),
            extension: "jemdoc".to_string(),
        }
    }
}

impl Settings {
    /// Load `autoreload.toml` from `root`, or defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(SETTINGS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
        let (settings, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            log!("warning"; "unknown fields in {}, ignoring: {}", SETTINGS_FILE, ignored.join(", "));
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let settings = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((settings, ignored))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let build = &self.build;
        if build.compiler.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "`build.compiler` must name a program".into(),
            ));
        }
        if build.config.as_os_str().is_empty() || build.config.is_absolute() {
            return Err(ConfigError::Validation(
                "`build.config` must be a path relative to the project root".into(),
            ));
        }
        if build.menu.is_empty() || build.menu.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "`build.menu` must be a plain file name".into(),
            ));
        }
        if build.extension.is_empty() || build.extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::Validation(
                "`build.extension` must be an extension without a dot, e.g. \"jemdoc\"".into(),
            ));
        }
        if self.serve.port == 0 {
            return Err(ConfigError::Validation("`serve.port` must not be 0".into()));
        }
        Ok(())
    }

    /// Apply `serve` command-line overrides.
    pub fn apply_serve_args(&mut self, args: &ServeArgs) {
        if let Some(interface) = args.interface {
            self.serve.interface = interface;
        }
        if let Some(port) = args.port {
            self.serve.port = port;
        }
        if let Some(watch) = args.watch {
            self.serve.watch = watch;
        }
        if let Some(live_reload) = args.live_reload {
            self.serve.live_reload = live_reload;
        }
    }
}

#[cfg(test)]
fn parse_settings(content: &str) -> Settings {
    let (parsed, ignored) = Settings::parse_with_ignored(content).unwrap();
    assert!(ignored.is_empty(), "unknown fields: {ignored:?}");
    parsed.validate().unwrap();
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = parse_settings("");
        assert_eq!(settings.serve.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(settings.serve.port, 8000);
        assert!(settings.serve.watch);
        assert!(settings.serve.live_reload);
        assert_eq!(settings.build.compiler, vec!["jemdoc"]);
        assert_eq!(settings.build.config, PathBuf::from("mysite.conf"));
        assert_eq!(settings.build.menu, "MENU");
        assert_eq!(settings.build.extension, "jemdoc");
    }

    #[test]
    fn test_partial_override() {
        let settings = parse_settings(
            "[serve]\nport = 3000\n[build]\ncompiler = [\"python3\", \"-m\", \"jemdoc\"]",
        );
        assert_eq!(settings.serve.port, 3000);
        assert!(settings.serve.watch);
        assert_eq!(settings.build.compiler, vec!["python3", "-m", "jemdoc"]);
        assert_eq!(settings.build.menu, "MENU");
    }

    #[test]
    fn test_unknown_fields_collected() {
        let (_, ignored) = Settings::parse_with_ignored("[serve]\nprot = 1\n[extra]\na = 1").unwrap();
        assert_eq!(ignored.len(), 2);
        assert!(ignored.iter().any(|f| f == "serve.prot"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for content in [
            "[build]\ncompiler = []",
            "[build]\ncompiler = [\" \"]",
            "[build]\nextension = \".jemdoc\"",
            "[build]\nmenu = \"sub/MENU\"",
            "[build]\nconfig = \"\"",
            "[serve]\nport = 0",
        ] {
            let (settings, _) = Settings::parse_with_ignored(content).unwrap();
            assert!(
                matches!(settings.validate(), Err(ConfigError::Validation(_))),
                "accepted: {content}"
            );
        }
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load(temp.path()).unwrap();
        assert_eq!(settings.serve.port, 8000);
    }

    #[test]
    fn test_load_reports_toml_errors() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(SETTINGS_FILE), "[serve\nport = ").unwrap();
        assert!(matches!(
            Settings::load(temp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_apply_serve_args() {
        let mut settings = Settings::default();
        settings.apply_serve_args(&ServeArgs {
            interface: Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: Some(9000),
            watch: Some(false),
            live_reload: None,
        });
        assert_eq!(settings.serve.interface, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(settings.serve.port, 9000);
        assert!(!settings.serve.watch);
        assert!(settings.serve.live_reload);
    }
}
