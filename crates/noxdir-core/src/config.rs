//! Application config directory and `settings.json`.
//!
//! The config directory (`~/.noxdir` on POSIX, `%LocalAppData%\.noxdir`
//! on Windows) holds the settings file and the cache records. Failing to
//! resolve it is fatal — the caller exits non-zero.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DIR_NAME: &str = ".noxdir";
pub const SETTINGS_FILE: &str = "settings.json";

/// Persisted user settings; CLI flags override individual fields.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub color_schema: String,
    pub exclude: Vec<String>,
    pub no_empty_dirs: bool,
    pub no_hidden: bool,
    pub simple_color: bool,
    pub use_cache: bool,

    /// Resolved config directory; not part of the file itself.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Settings {
    pub fn settings_path(&self) -> PathBuf {
        self.path.join(SETTINGS_FILE)
    }
}

/// Resolve (and create) the application config directory.
pub fn resolve_config_dir() -> Result<PathBuf, ConfigError> {
    let base = config_base()?;
    let full = base.join(DIR_NAME);

    fs::create_dir_all(&full).map_err(|source| ConfigError::Create {
        path: full.clone(),
        source,
    })?;

    Ok(full)
}

#[cfg(unix)]
fn config_base() -> Result<PathBuf, ConfigError> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDir)
}

#[cfg(windows)]
fn config_base() -> Result<PathBuf, ConfigError> {
    std::env::var_os("LOCALAPPDATA")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDir)
}

/// Load settings from the config directory, writing a default file on
/// first run.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let dir = resolve_config_dir()?;
    load_settings_from(&dir)
}

/// Load settings from an explicit directory. Split out so tests can use
/// a temp dir instead of the real home.
pub fn load_settings_from(dir: &Path) -> Result<Settings, ConfigError> {
    let file = dir.join(SETTINGS_FILE);

    if !file.exists() {
        let defaults = Settings::default();
        let body = serde_json::to_string_pretty(&defaults)?;
        fs::write(&file, body)?;
    }

    let body = fs::read_to_string(&file)?;
    let mut settings: Settings = serde_json::from_str(&body)?;
    settings.path = dir.to_path_buf();

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(dir.path()).unwrap();

        assert!(dir.path().join(SETTINGS_FILE).exists());
        assert!(!settings.use_cache);
        assert!(settings.exclude.is_empty());
        assert_eq!(settings.path, dir.path());
    }

    #[test]
    fn existing_settings_are_parsed() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"exclude":["node_modules"],"useCache":true,"noHidden":true}"#,
        )
        .unwrap();

        let settings = load_settings_from(dir.path()).unwrap();
        assert_eq!(settings.exclude, vec!["node_modules"]);
        assert!(settings.use_cache);
        assert!(settings.no_hidden);
        assert!(!settings.no_empty_dirs);
    }

    #[test]
    fn malformed_settings_fail_loud() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "not json").unwrap();
        assert!(load_settings_from(dir.path()).is_err());
    }
}
