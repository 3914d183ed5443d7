//! Scan execution and orchestration.
//!
//! This module wires the pieces together for one run:
//! - Configuration merging (CLI + config file)
//! - Registry construction and root validation
//! - Walking, checking and reporting through the worker pipeline

pub mod config;
mod logging;

pub use config::EffectiveConfig;
pub use logging::{default_filter, init_logging};

use crate::Cli;
use crate::aggregator::{Summary, SummaryBuilder};
use crate::config::Config;
use crate::discovery::{DirectoryWalker, WalkConfig};
use crate::engine::{Engine, absolute_roots};
use crate::error::{Result, VerifyError};
use crate::registry::Registry;
use crate::reporter::Reporter;
use crate::runtime::{PipelineConfig, ShutdownCheck, run_pipeline};
use crate::verifier::Invoker;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Check every file under the CLI's roots, feeding `reporter` as records arrive.
///
/// Per-file problems end up in the summary; only configuration errors,
/// unreadable roots and a failing reporter return `Err`.
pub fn run_scan(
    cli: &Cli,
    reporter: &mut dyn Reporter,
    shutdown: Arc<dyn ShutdownCheck>,
) -> Result<Summary> {
    let started = Instant::now();

    let config = Config::load(cli.config.as_deref())?;
    let registry = Arc::new(Registry::from_config(&config)?);
    let effective = EffectiveConfig::from_cli_and_config(cli, &config.scan);
    debug!(
        formats = registry.formats().len(),
        header_rules = registry.ordered_header_rules().len(),
        jobs = effective.jobs,
        timeout_secs = effective.timeout_secs,
        "Registry loaded"
    );

    let roots = absolute_roots(&cli.paths);
    for root in &roots {
        check_root(root)?;
    }

    let invoker = Invoker::with_timeout_secs(effective.timeout_secs, Arc::clone(&shutdown));
    let engine = Engine::new(Arc::clone(&registry), invoker, effective.mode);
    let walker = DirectoryWalker::new(
        WalkConfig::new(effective.excluded_dirs.iter().cloned())
            .with_follow_symlinks(effective.follow_symlinks),
    )
    .with_overrides(registry.overrides());

    let entries = roots.iter().flat_map(|root| walker.walk(root));
    let mut summary = SummaryBuilder::new();
    let stats = run_pipeline(
        entries,
        &engine,
        PipelineConfig::new(effective.jobs),
        &*shutdown,
        |record| {
            summary.add(&record);
            reporter.emit(&record)
        },
    )
    .map_err(output_error)?;

    let summary = summary
        .with_interrupted(stats.interrupted)
        .with_duration_ms(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
        .build();
    reporter.finish(&summary).map_err(output_error)?;

    info!(
        files = summary.files,
        failed = summary.failed,
        interrupted = summary.interrupted,
        elapsed_ms = summary.elapsed_ms,
        "Scan finished"
    );
    Ok(summary)
}

/// A root must exist and, if it is a directory, be listable.
fn check_root(root: &Path) -> Result<()> {
    let unreadable = |source| VerifyError::RootUnreadable {
        path: root.display().to_string(),
        source,
    };
    let metadata = fs::metadata(root).map_err(unreadable)?;
    if metadata.is_dir() {
        fs::read_dir(root).map_err(unreadable)?;
    }
    Ok(())
}

fn output_error(source: std::io::Error) -> VerifyError {
    VerifyError::Output {
        path: "<stdout>".to_string(),
        source,
    }
}
