//! Record-to-message mapping shared by the line-oriented reporters.

use crate::outcome::{FileRecord, MatchBasis, Outcome};
use std::fmt;

/// Severity of a reported line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    /// Least verbosity at which lines of this level are shown.
    pub fn min_verbosity(self) -> u8 {
        match self {
            Self::Error => 1,
            Self::Warn => 2,
            Self::Info => 3,
            Self::Debug => 4,
        }
    }

    pub fn is_shown_at(self, verbosity: u8) -> bool {
        verbosity >= self.min_verbosity()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of human-readable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub level: Level,
    pub message: String,
}

impl Event {
    fn new(level: Level, message: String) -> Self {
        Self { level, message }
    }
}

/// The line for a record, followed by its diagnostic (if any) at debug level.
pub fn events_for(record: &FileRecord) -> Vec<Event> {
    let mut events = vec![primary(record)];
    if let Some(diagnostic) = &record.diagnostic {
        events.push(Event::new(
            Level::Debug,
            format!("...because: {}", diagnostic.replace('\n', "\n    ")),
        ));
    }
    events
}

fn primary(record: &FileRecord) -> Event {
    let path = record.path.display();
    let description = record.description.as_deref().unwrap_or("File");

    match &record.outcome {
        Outcome::Ok => Event::new(Level::Info, format!("{description} OK: {path}")),
        Outcome::Failed { reason } => Event::new(
            Level::Error,
            format!("{description} verification failed: {path} ({reason})"),
        ),
        Outcome::Unverifiable { reason } => Event::new(Level::Warn, format!("{reason}: {path}")),
        Outcome::Skipped { reason } if record.basis == MatchBasis::Override => {
            Event::new(Level::Info, format!("{reason}: {path}"))
        }
        Outcome::Skipped { reason } => {
            Event::new(Level::Debug, format!("Ignoring {path} ({description}, {reason})"))
        }
        Outcome::ToolUnavailable { tool } => Event::new(
            Level::Warn,
            format!("{description}: cannot verify {path}: '{tool}' is not installed"),
        ),
        Outcome::ClassificationUnresolved => {
            Event::new(Level::Warn, format!("Unrecognized file type: {path}"))
        }
        Outcome::PathError { reason } => Event::new(
            Level::Error,
            format!("Error while reading file: {path} ({reason})"),
        ),
    }
}
