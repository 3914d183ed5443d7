//! Normalized verification results.
//!
//! Every path the walker yields ends up as exactly one [`FileRecord`], whose
//! [`Outcome`] collapses exit codes, decode errors, checksum mismatches and
//! I/O failures into a single model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The normalized result of verifying one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The format-specific check ran to completion and found nothing wrong.
    Ok,
    /// The check actively detected a problem.
    Failed { reason: String },
    /// The file was read successfully but no real integrity check is possible.
    Unverifiable { reason: String },
    /// The file was deliberately not checked.
    Skipped { reason: String },
    /// The executable backing the handler could not be found or started.
    ToolUnavailable { tool: String },
    /// No extension or header rule matched.
    ClassificationUnresolved,
    /// The path is missing, unreadable, or empty.
    PathError { reason: String },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn unverifiable(reason: impl Into<String>) -> Self {
        Self::Unverifiable {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn path_error(reason: impl Into<String>) -> Self {
        Self::PathError {
            reason: reason.into(),
        }
    }

    pub fn tool_unavailable(tool: impl Into<String>) -> Self {
        Self::ToolUnavailable { tool: tool.into() }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Ok => OutcomeKind::Ok,
            Self::Failed { .. } => OutcomeKind::Failed,
            Self::Unverifiable { .. } => OutcomeKind::Unverifiable,
            Self::Skipped { .. } => OutcomeKind::Skipped,
            Self::ToolUnavailable { .. } => OutcomeKind::ToolUnavailable,
            Self::ClassificationUnresolved => OutcomeKind::ClassificationUnresolved,
            Self::PathError { .. } => OutcomeKind::PathError,
        }
    }

    /// Whether this outcome should make the run exit non-zero.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::PathError { .. })
    }

    /// The human-readable reason carried by the variant, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason }
            | Self::Unverifiable { reason }
            | Self::Skipped { reason }
            | Self::PathError { reason } => Some(reason),
            Self::ToolUnavailable { tool } => Some(tool),
            Self::Ok | Self::ClassificationUnresolved => None,
        }
    }
}

/// Payload-free discriminant of [`Outcome`], used for counting and comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Ok,
    Failed,
    Unverifiable,
    Skipped,
    ToolUnavailable,
    ClassificationUnresolved,
    PathError,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Unverifiable => "unverifiable",
            Self::Skipped => "skipped",
            Self::ToolUnavailable => "tool_unavailable",
            Self::ClassificationUnresolved => "unresolved",
            Self::PathError => "path_error",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a file's format identity was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchBasis {
    Extension,
    Header,
    /// A configured path override decided the handling.
    Override,
    None,
}

impl MatchBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extension => "extension",
            Self::Header => "header",
            Self::Override => "override",
            Self::None => "none",
        }
    }
}

/// One line of the report: a path and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub basis: MatchBasis,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl FileRecord {
    /// A record for a path that never got as far as classification.
    pub fn unclassified(path: PathBuf, size: u64, outcome: Outcome) -> Self {
        Self {
            path,
            size,
            format: None,
            description: None,
            basis: MatchBasis::None,
            outcome,
            diagnostic: None,
        }
    }
}
