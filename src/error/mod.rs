//! Error types for rotscan.
//!
//! Per-file problems never surface here; they become an
//! [`Outcome`](crate::outcome::Outcome) on that file's record. `VerifyError`
//! is reserved for conditions that end the whole run: a malformed registry,
//! an unreadable root, or a broken output stream.

use crate::config::ConfigError;
use crate::registry::RegistryError;
use thiserror::Error;

/// Run-terminating error.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The configuration parsed but describes an invalid registry.
    #[error("Invalid format registry: {0}")]
    Registry(#[from] RegistryError),

    /// A root given on the command line cannot be scanned at all.
    #[error("Cannot read root {path}: {source}")]
    RootUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The report could not be written.
    #[error("Failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The logging subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type alias for operations that may end the run.
pub type Result<T> = std::result::Result<T, VerifyError>;
