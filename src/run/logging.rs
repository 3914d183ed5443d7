use crate::error::{Result, VerifyError};
use tracing_subscriber::EnvFilter;

/// Verbosity at which internal debug logging is switched on.
const DEBUG_LOG_VERBOSITY: u8 = 5;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbosity: u8) -> &'static str {
    if verbosity >= DEBUG_LOG_VERBOSITY {
        "rotscan=debug"
    } else {
        "rotscan=warn"
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the verbosity.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| VerifyError::Logging(e.to_string()))
}
