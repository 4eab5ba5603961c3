//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::Result;
use crate::error::Error;
use crate::handoff::HANDOFF_FILE;
use crate::portal::DEFAULT_PORTAL;

/// File name of the final cookie set inside the state directory
pub const COOKIES_FILE: &str = "cookies.json";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Portal used when `login` is run without a host
    #[serde(default = "default_portal")]
    pub portal: String,

    /// Where the handoff and cookie files live; defaults to the install directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Launch the browser automatically
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

fn default_portal() -> String {
    DEFAULT_PORTAL.to_string()
}

fn default_open_browser() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal: default_portal(),
            data_dir: None,
            open_browser: default_open_browser(),
        }
    }
}

impl Config {
    /// Resolve the state directory: explicit override, config, then install dir
    ///
    /// Always absolute. The callback process starts in whatever working
    /// directory the OS picks, so a relative path would point elsewhere.
    pub fn state_dir(&self, overridden: Option<&Path>) -> Result<PathBuf> {
        match overridden.or(self.data_dir.as_deref()) {
            Some(dir) => absolute(dir),
            None => installation_dir(),
        }
    }
}

fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

/// Resolved locations of the two persisted artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub dir: PathBuf,
    pub handoff: PathBuf,
    pub cookies: PathBuf,
}

impl StatePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            handoff: dir.join(HANDOFF_FILE),
            cookies: dir.join(COOKIES_FILE),
            dir,
        }
    }
}

/// Directory containing the running executable
pub fn installation_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Config(format!("Executable {:?} has no parent directory", exe)))
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wilma-auth")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from the default location
///
/// A missing file means defaults.
pub fn load() -> Result<Config> {
    load_from(&config_path())
}

/// Load configuration from a specific file
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config {:?}: {}", path, e)))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.portal, "https://turku.inschool.fi");
        assert!(config.data_dir.is_none());
        assert!(config.open_browser);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"open_browser": false}"#).unwrap();
        assert_eq!(config.portal, DEFAULT_PORTAL);
        assert!(!config.open_browser);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.portal, DEFAULT_PORTAL);
    }

    #[test]
    fn test_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{"portal": 5}"#).unwrap();
        assert!(matches!(load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_state_dir_precedence() {
        let mut config = Config::default();
        assert_eq!(config.state_dir(None).unwrap(), installation_dir().unwrap());

        config.data_dir = Some(PathBuf::from("/var/lib/wilma"));
        assert_eq!(config.state_dir(None).unwrap(), PathBuf::from("/var/lib/wilma"));
        assert_eq!(
            config.state_dir(Some(Path::new("/tmp/override"))).unwrap(),
            PathBuf::from("/tmp/override")
        );
    }

    #[test]
    fn test_relative_state_dir_is_made_absolute() {
        let cwd = std::env::current_dir().unwrap();

        let dir = Config::default().state_dir(Some(Path::new("state"))).unwrap();
        assert_eq!(dir, cwd.join("state"));

        let config = Config {
            data_dir: Some(PathBuf::from("relative/wilma")),
            ..Config::default()
        };
        let paths = StatePaths::new(config.state_dir(None).unwrap());
        assert!(paths.handoff.is_absolute());
        assert_eq!(paths.handoff, cwd.join("relative/wilma").join(HANDOFF_FILE));
    }

    #[test]
    fn test_state_paths() {
        let paths = StatePaths::new("/srv/state");
        assert_eq!(paths.handoff, PathBuf::from("/srv/state/handoff.json"));
        assert_eq!(paths.cookies, PathBuf::from("/srv/state/cookies.json"));
    }
}
