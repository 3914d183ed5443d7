use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Verbosity when neither `-v` nor `-q` is given: errors and warnings.
pub const DEFAULT_VERBOSITY: u8 = 2;

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "rotscan",
    version,
    about = "Detect bit-rot and truncation in file trees",
    long_about = "rotscan walks the given files and directories, works out what format each file \
                  is in, and runs the matching integrity check: built-in decoders for common \
                  formats, external tools for the rest."
)]
pub struct Cli {
    /// Files or directories to check
    #[arg(required_unless_present = "list_builtins")]
    pub paths: Vec<PathBuf>,

    /// Show more output (repeatable: -v shows verified files, -vv skipped files and tool output)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Show less output (repeatable: -q errors only, -qq nothing)
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Classify files without running any integrity check
    #[arg(long, visible_alias = "list-unrecognized")]
    pub classify_only: bool,

    /// Print the built-in handlers and exit
    #[arg(long)]
    pub list_builtins: bool,

    /// Path to a registry file (replaces the default registry)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of files checked in parallel (default: one per CPU)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Seconds an external tool may run before it is killed (0 disables the limit)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Effective verbosity: 0 silent, 1 errors, 2 warnings, 3 info, 4+ debug.
    pub fn verbosity(&self) -> u8 {
        DEFAULT_VERBOSITY
            .saturating_add(self.verbose)
            .saturating_sub(self.quiet)
    }
}
