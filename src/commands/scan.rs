//! Scan mode handler.

use super::{EXIT_FAILED, EXIT_FATAL, EXIT_INTERRUPTED, HandlerResult};
use crate::aggregator::Summary;
use crate::cli::{Cli, OutputFormat};
use crate::engine::absolute_roots;
use crate::reporter::Reporter;
use crate::reporter::json::JsonReporter;
use crate::reporter::terminal::TerminalReporter;
use crate::run::run_scan;
use crate::runtime::ShutdownCheck;
use std::io;
use std::sync::Arc;
use tracing::info;

/// Run a scan over the CLI's paths, writing the report to stdout.
pub fn handle_scan(cli: &Cli, shutdown: Arc<dyn ShutdownCheck>) -> HandlerResult {
    info!(paths = ?cli.paths, "Starting scan");

    let stdout = io::stdout().lock();
    let mut reporter: Box<dyn Reporter> = match cli.format {
        OutputFormat::Terminal => Box::new(TerminalReporter::new(stdout, cli.verbosity())),
        OutputFormat::Json => Box::new(JsonReporter::new(stdout, absolute_roots(&cli.paths))),
    };

    match run_scan(cli, reporter.as_mut(), shutdown) {
        Ok(summary) => exit_status(&summary),
        Err(e) => {
            eprintln!("Error: {e}");
            HandlerResult::Error(EXIT_FATAL)
        }
    }
}

/// Map run totals onto the process exit status.
pub fn exit_status(summary: &Summary) -> HandlerResult {
    if summary.interrupted {
        HandlerResult::Error(EXIT_INTERRUPTED)
    } else if summary.passed {
        HandlerResult::Success
    } else {
        HandlerResult::Error(EXIT_FAILED)
    }
}
