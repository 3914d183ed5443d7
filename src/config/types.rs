//! Configuration type definitions.
//!
//! These structs mirror `verifiers.toml` one-to-one. They are deliberately
//! loose (strings, options) so that [`Registry::from_config`] can report every
//! semantic problem with a precise message instead of a serde error.
//!
//! [`Registry::from_config`]: crate::registry::Registry::from_config

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directory names that are never descended into.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[".git", ".hg", ".svn", ".bzr", "_darcs", "CVS"];

/// Default liveness bound for external tools.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Root of the configuration schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Traversal and execution settings.
    pub scan: ScanConfig,
    /// Format definitions. Order matters: header rules are probed in this order.
    #[serde(rename = "filetype")]
    pub filetypes: Vec<FiletypeConfig>,
    /// External (subprocess) handler definitions, keyed by handler id.
    #[serde(rename = "handler")]
    pub handlers: BTreeMap<String, HandlerConfig>,
    /// Path-based exceptions to normal classification.
    #[serde(rename = "override")]
    pub overrides: Vec<OverrideConfig>,
}

/// Scan configuration (corresponds to CLI options).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Number of worker threads. `None` means one per available CPU.
    pub jobs: Option<usize>,
    /// Seconds an external tool may run before its process group is killed.
    pub timeout_secs: u64,
    /// Directory names that are never descended into.
    pub excluded_dirs: Vec<String>,
    /// Whether to follow symbolic links during traversal.
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            excluded_dirs: DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            follow_symlinks: false,
        }
    }
}

/// A field that accepts either a single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrList<T> {
    One(T),
    List(Vec<T>),
}

impl<T> OneOrList<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::List(values) => values,
        }
    }
}

/// Definition of `[[filetype]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiletypeConfig {
    /// Identifier that other entries can reference via `container`.
    /// Defaults to the first extension without its leading dot.
    pub id: Option<String>,
    /// Human-readable description for status messages.
    pub description: String,
    /// One or more extensions (with leading dot) that identify the format.
    pub extension: Option<OneOrList<String>>,
    /// One or more hex-encoded magic sequences.
    pub header: Option<OneOrList<String>>,
    /// Bytes to skip before matching `header`.
    pub header_offset: usize,
    /// Decompress the leading bytes with this codec before matching `header`.
    pub header_inflate: Option<String>,
    /// The `id` of the format this one's payload is stored in.
    pub container: Option<String>,
    /// A built-in handler id or the key of a `[handler.*]` table.
    pub handler: String,
    /// Image formats that may hold several frames, of which only one is decoded.
    pub multipage: bool,
    /// Run the handler inside a throwaway working directory.
    pub use_temporary_dir: bool,
}

/// Definition of `[handler.*]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// Command template. Supports `{path}` and `{devnull}`; if neither token
    /// appears, the path is appended.
    pub argv: Vec<String>,
    /// Treat the run as failed if stderr contains this text, whatever the exit code.
    pub fail_if_stderr: Option<String>,
    /// Run inside a throwaway working directory.
    pub use_temporary_dir: bool,
}

/// Definition of `[[override]]` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideConfig {
    /// Path pattern. A leading `*/` makes it a suffix match on whole components.
    pub path: String,
    /// Message to report when the override applies.
    pub message: Option<String>,
    /// Handler to use instead of autodetection.
    pub handler: Option<String>,
    /// If `false` and `path` matches a directory, do not descend into it.
    #[serde(default = "default_recurse")]
    pub recurse: bool,
}

fn default_recurse() -> bool {
    true
}
