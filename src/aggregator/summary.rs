//! Run totals.

use crate::outcome::{FileRecord, OutcomeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Totals for a finished (or interrupted) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub files: usize,
    pub ok: usize,
    pub failed: usize,
    pub unverifiable: usize,
    pub skipped: usize,
    pub tool_unavailable: usize,
    pub unresolved: usize,
    pub path_errors: usize,
    /// No file failed verification and every path could be read.
    pub passed: bool,
    /// The run was cut short by an interrupt.
    pub interrupted: bool,
    pub elapsed_ms: u64,
}

impl Summary {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Ok => self.ok,
            OutcomeKind::Failed => self.failed,
            OutcomeKind::Unverifiable => self.unverifiable,
            OutcomeKind::Skipped => self.skipped,
            OutcomeKind::ToolUnavailable => self.tool_unavailable,
            OutcomeKind::ClassificationUnresolved => self.unresolved,
            OutcomeKind::PathError => self.path_errors,
        }
    }
}

/// Builder for creating run summaries.
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    counts: BTreeMap<OutcomeKind, usize>,
    interrupted: bool,
    elapsed_ms: u64,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one emitted record.
    pub fn add(&mut self, record: &FileRecord) {
        *self.counts.entry(record.outcome.kind()).or_default() += 1;
    }

    pub fn with_interrupted(mut self, interrupted: bool) -> Self {
        self.interrupted = interrupted;
        self
    }

    pub fn with_duration_ms(mut self, duration: u64) -> Self {
        self.elapsed_ms = duration;
        self
    }

    /// Number of records counted so far.
    pub fn files(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn build(self) -> Summary {
        let get = |kind| self.counts.get(&kind).copied().unwrap_or(0);
        let failed = get(OutcomeKind::Failed);
        let path_errors = get(OutcomeKind::PathError);

        Summary {
            files: self.files(),
            ok: get(OutcomeKind::Ok),
            failed,
            unverifiable: get(OutcomeKind::Unverifiable),
            skipped: get(OutcomeKind::Skipped),
            tool_unavailable: get(OutcomeKind::ToolUnavailable),
            unresolved: get(OutcomeKind::ClassificationUnresolved),
            path_errors,
            passed: failed == 0 && path_errors == 0,
            interrupted: self.interrupted,
            elapsed_ms: self.elapsed_ms,
        }
    }
}
