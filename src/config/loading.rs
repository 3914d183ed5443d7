//! Configuration loading functions.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::ConfigError;
use super::types::Config;

/// The registry shipped with the binary.
pub const DEFAULT_CONFIG: &str = include_str!("../../verifiers.toml");

/// File name looked up in the user's configuration directory.
pub const CONFIG_FILE_NAME: &str = "verifiers.toml";

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse configuration text. `origin` is only used in error messages.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseToml {
            path: origin.to_string(),
            source: e,
        })
    }

    /// The embedded default registry.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG, "<built-in verifiers.toml>")
    }

    /// Load configuration.
    ///
    /// Search order:
    /// 1. `explicit`, if given (errors are returned, not swallowed)
    /// 2. `~/.config/rotscan/verifiers.toml`
    /// 3. The embedded default
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "Loading explicit config");
            return Self::from_file(path);
        }

        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            debug!(path = %user_config.display(), "Loading user config");
            return Self::from_file(&user_config);
        }

        debug!("Using built-in config");
        Self::builtin()
    }
}

/// Location of the per-user registry override.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rotscan").join(CONFIG_FILE_NAME))
}
