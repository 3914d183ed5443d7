//! Cooperative cancellation.
//!
//! A single flag is shared by the walker, the workers and any running
//! subprocess supervisor. SIGINT sets it; nothing ever clears it during a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something that can be asked whether the run should stop.
pub trait ShutdownCheck: Send + Sync {
    fn should_stop(&self) -> bool;
}

/// Flag that tracks whether shutdown has been requested.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Create a flag and register a Ctrl+C handler that sets it.
    ///
    /// Registration can fail if a handler is already installed (for example
    /// in tests); the flag is still usable and can be triggered manually.
    pub fn new() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&flag);

        if let Err(e) = ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
        }) {
            tracing::debug!(error = %e, "Could not install interrupt handler");
        }

        Self { flag }
    }

    /// Create a flag without registering a handler.
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl ShutdownCheck for ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Never signals shutdown. Used where no interrupt handling is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverShutdown;

impl ShutdownCheck for NeverShutdown {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Stops when either of two checks does.
#[derive(Clone, Copy)]
pub struct EitherStop<'a> {
    pub first: &'a dyn ShutdownCheck,
    pub second: &'a dyn ShutdownCheck,
}

impl ShutdownCheck for EitherStop<'_> {
    fn should_stop(&self) -> bool {
        self.first.should_stop() || self.second.should_stop()
    }
}

impl ShutdownCheck for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}
