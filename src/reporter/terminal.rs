use crate::aggregator::Summary;
use crate::outcome::FileRecord;
use crate::reporter::Reporter;
use crate::reporter::event::{Level, events_for};
use colored::Colorize;
use std::io::{self, Write};

/// Line-per-record output filtered by verbosity.
///
/// Verbosity 0 prints nothing, 1 errors, 2 warnings (the default), 3 every
/// verified file, 4 and up also skipped files and tool diagnostics.
pub struct TerminalReporter<W: Write> {
    out: W,
    verbosity: u8,
}

impl<W: Write> TerminalReporter<W> {
    pub fn new(out: W, verbosity: u8) -> Self {
        Self { out, verbosity }
    }

    fn level_label(&self, level: Level) -> colored::ColoredString {
        let label = format!("{level}:");
        match level {
            Level::Error => label.red().bold(),
            Level::Warn => label.yellow(),
            Level::Info => label.green(),
            Level::Debug => label.dimmed(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for TerminalReporter<W> {
    fn emit(&mut self, record: &FileRecord) -> io::Result<()> {
        for event in events_for(record) {
            if event.level.is_shown_at(self.verbosity) {
                writeln!(self.out, "{} {}", self.level_label(event.level), event.message)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, summary: &Summary) -> io::Result<()> {
        if self.verbosity == 0 {
            return self.out.flush();
        }

        let status = if summary.interrupted {
            "INTERRUPTED".yellow().bold()
        } else if summary.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        writeln!(
            self.out,
            "\n{}: {} files, {} ok, {} failed, {} unreadable, {} unverifiable, {} unrecognized, {} tool missing, {} skipped ({:.1}s)",
            status,
            summary.files,
            summary.ok,
            summary.failed,
            summary.path_errors,
            summary.unverifiable,
            summary.unresolved,
            summary.tool_unavailable,
            summary.skipped,
            summary.elapsed_ms as f64 / 1000.0
        )?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SummaryBuilder;
    use crate::outcome::Outcome;
    use crate::test_utils::fixtures::record;

    fn render(verbosity: u8, records: &[FileRecord]) -> String {
        colored::control::set_override(false);
        let mut reporter = TerminalReporter::new(Vec::new(), verbosity);
        let mut summary = SummaryBuilder::new();
        for rec in records {
            reporter.emit(rec).unwrap();
            summary.add(rec);
        }
        reporter.finish(&summary.build()).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    fn sample() -> Vec<FileRecord> {
        vec![
            record("/d/good.zip", Outcome::Ok),
            record("/d/bad.zip", Outcome::failed("bad crc")),
            record("/d/plain.txt", Outcome::unverifiable("Plaintext files cannot be verified")),
        ]
    }

    #[test]
    fn test_default_verbosity_shows_errors_and_warnings() {
        let output = render(2, &sample());
        assert!(output.contains("ERROR: Zip archive verification failed: /d/bad.zip"));
        assert!(output.contains("WARNING: Plaintext files cannot be verified: /d/plain.txt"));
        assert!(!output.contains("good.zip"));
        assert!(output.contains("FAIL: 3 files, 1 ok, 1 failed"));
    }

    #[test]
    fn test_info_verbosity_shows_ok_files() {
        let output = render(3, &sample());
        assert!(output.contains("INFO: Zip archive OK: /d/good.zip"));
    }

    #[test]
    fn test_quiet_prints_nothing() {
        assert_eq!(render(0, &sample()), "");
    }

    #[test]
    fn test_errors_only() {
        let output = render(1, &sample());
        assert!(output.contains("bad.zip"));
        assert!(!output.contains("plain.txt"));
    }
}
