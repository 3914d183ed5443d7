//! Effective run settings after merging CLI and config file.

use crate::Cli;
use crate::config::ScanConfig;
use crate::engine::Mode;
use crate::runtime::PipelineConfig;

/// Run settings after merging CLI flags with the `[scan]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub mode: Mode,
    pub jobs: usize,
    /// Zero means external tools are never timed out.
    pub timeout_secs: u64,
    pub excluded_dirs: Vec<String>,
    pub follow_symlinks: bool,
}

impl EffectiveConfig {
    /// Merge CLI options with config file settings.
    ///
    /// - `--jobs` and `--timeout` take precedence when given
    /// - otherwise the config value is used, and for jobs one worker per CPU
    pub fn from_cli_and_config(cli: &Cli, scan: &ScanConfig) -> Self {
        let mode = if cli.classify_only {
            Mode::ClassifyOnly
        } else {
            Mode::Verify
        };

        let jobs = cli
            .jobs
            .map(usize::from)
            .or(scan.jobs)
            .filter(|&n| n > 0)
            .unwrap_or_else(|| PipelineConfig::from_available_parallelism().workers);

        Self {
            mode,
            jobs,
            timeout_secs: cli.timeout.unwrap_or(scan.timeout_secs),
            excluded_dirs: scan.excluded_dirs.clone(),
            follow_symlinks: scan.follow_symlinks,
        }
    }
}
