//! Configuration layer for rotscan.
//!
//! The configuration file doubles as the format registry's source data:
//! `[[filetype]]`, `[handler.*]` and `[[override]]` tables are turned into a
//! validated [`Registry`](crate::registry::Registry) at startup, while `[scan]`
//! holds run settings that the CLI may override.
//!
//! ## Layers
//! - `types`: Configuration type definitions
//! - `loading`: File loading logic and the embedded default

mod error;
mod loading;
mod types;

pub use error::ConfigError;
pub use loading::{CONFIG_FILE_NAME, DEFAULT_CONFIG, user_config_path};
pub use types::{
    Config, DEFAULT_EXCLUDED_DIRS, DEFAULT_TIMEOUT_SECS, FiletypeConfig, HandlerConfig,
    OneOrList, OverrideConfig, ScanConfig,
};
