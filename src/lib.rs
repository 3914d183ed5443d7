pub mod aggregator;
pub mod classifier;
pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod registry;
pub mod reporter;
pub mod run;
pub mod runtime;
pub mod verifier;

#[cfg(test)]
pub mod test_utils;

pub use aggregator::{Summary, SummaryBuilder};
pub use classifier::{Classification, Classifier};
pub use cli::{Cli, OutputFormat};
pub use config::{Config, ConfigError};
pub use discovery::{DirectoryWalker, WalkConfig, WalkEntry};
pub use engine::{Engine, Mode};
pub use error::{Result, VerifyError};
pub use outcome::{FileRecord, MatchBasis, Outcome, OutcomeKind};
pub use registry::{FormatDescriptor, HandlerSpec, Registry, RegistryError};
pub use reporter::{Reporter, json::JsonReporter, terminal::TerminalReporter};
pub use run::{init_logging, run_scan};
pub use verifier::{Invoker, Verification};
