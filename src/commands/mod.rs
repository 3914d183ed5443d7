//! CLI command handlers.
//!
//! Separated from main.rs so exit-code decisions can be unit tested.

mod builtins;
mod scan;

use std::process::ExitCode;

pub use builtins::{handle_list_builtins, write_builtins};
pub use scan::{exit_status, handle_scan};

/// Every file passed (or was only unverifiable, skipped or unrecognized).
pub const EXIT_OK: u8 = 0;
/// At least one file failed verification or could not be read.
pub const EXIT_FAILED: u8 = 1;
/// Configuration error or an unreadable root; nothing was checked.
pub const EXIT_FATAL: u8 = 2;
/// Stopped by Ctrl+C.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Result type for handler functions that can be tested.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    Success,
    Error(u8),
}

impl From<HandlerResult> for ExitCode {
    fn from(result: HandlerResult) -> Self {
        match result {
            HandlerResult::Success => ExitCode::SUCCESS,
            HandlerResult::Error(code) => ExitCode::from(code),
        }
    }
}
