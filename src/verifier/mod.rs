//! Handler invocation.
//!
//! The [`Invoker`] runs one handler against one file and normalizes whatever
//! happens into an [`Outcome`]. It never returns an error: a check that
//! cannot run still produces a record.

mod builtin;
mod subprocess;
mod zip_layout;

use crate::outcome::Outcome;
use crate::registry::{HandlerKind, HandlerSpec};
use crate::runtime::{EitherStop, NeverShutdown, ShutdownCheck};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// What a handler concluded about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub outcome: Outcome,
    /// Extra detail for debugging, such as a tool's stderr.
    pub diagnostic: Option<String>,
}

impl Verification {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: Option<String>) -> Self {
        self.diagnostic = diagnostic;
        self
    }
}

/// Runs handlers with a shared time limit and cancellation flag.
#[derive(Clone)]
pub struct Invoker {
    timeout: Option<Duration>,
    shutdown: Arc<dyn ShutdownCheck>,
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new(None, Arc::new(NeverShutdown))
    }
}

impl Invoker {
    /// `timeout` bounds external tools only; `None` lets them run forever.
    pub fn new(timeout: Option<Duration>, shutdown: Arc<dyn ShutdownCheck>) -> Self {
        Self { timeout, shutdown }
    }

    /// Build from a `timeout_secs` setting, where 0 disables the limit.
    pub fn with_timeout_secs(secs: u64, shutdown: Arc<dyn ShutdownCheck>) -> Self {
        let timeout = (secs > 0).then(|| Duration::from_secs(secs));
        Self::new(timeout, shutdown)
    }

    pub fn invoke(&self, path: &Path, handler: &HandlerSpec) -> Verification {
        self.invoke_until(path, handler, &NeverShutdown)
    }

    /// Like [`Invoker::invoke`], but a running tool is also stopped once
    /// `stop` fires.
    pub fn invoke_until(
        &self,
        path: &Path,
        handler: &HandlerSpec,
        stop: &dyn ShutdownCheck,
    ) -> Verification {
        trace!(path = %path.display(), handler = %handler.name, "Invoking handler");
        match &handler.kind {
            HandlerKind::Subprocess(spec) => {
                let stop = EitherStop {
                    first: self.shutdown.as_ref(),
                    second: stop,
                };
                subprocess::run(path, spec, self.timeout, &stop)
            }
            HandlerKind::StreamingDecode(kind) => Verification::new(
                builtin::decode(path, *kind).unwrap_or_else(builtin::CheckFailure::into_outcome),
            ),
            HandlerKind::StructuralQuery(kind) => Verification::new(
                builtin::query(path, *kind).unwrap_or_else(builtin::CheckFailure::into_outcome),
            ),
            HandlerKind::BestEffortRead { description } => Verification::new(
                match builtin::read_through(path) {
                    Ok(()) => {
                        Outcome::unverifiable(format!("{description} files cannot be verified"))
                    }
                    Err(failure) => failure.into_outcome(),
                },
            ),
            HandlerKind::Skip => Verification::new(Outcome::skipped("ignored by handler")),
        }
    }
}
