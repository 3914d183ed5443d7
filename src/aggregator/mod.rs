//! Aggregation of per-file records into run totals.

pub mod summary;

pub use summary::{Summary, SummaryBuilder};
