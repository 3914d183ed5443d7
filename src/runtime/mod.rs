//! Runtime execution control.
//!
//! - `shutdown`: interrupt flag shared by every stage
//! - `pipeline`: the worker pool that turns walk entries into ordered records

pub mod pipeline;
pub mod shutdown;

pub use pipeline::{PipelineConfig, PipelineStats, run_pipeline};
pub use shutdown::{EitherStop, NeverShutdown, ShutdownCheck, ShutdownFlag};
