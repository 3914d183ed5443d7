//! File discovery.
//!
//! Turns the roots given on the command line into an ordered stream of
//! candidate files.

pub mod walker;

pub use walker::{DirectoryWalker, WalkConfig, WalkEntry};
