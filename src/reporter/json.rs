use crate::aggregator::Summary;
use crate::outcome::FileRecord;
use crate::reporter::Reporter;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

/// The single document written at the end of a JSON run.
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    pub version: &'static str,
    pub scanned_at: String,
    pub roots: &'a [PathBuf],
    pub summary: &'a Summary,
    pub records: &'a [FileRecord],
}

/// Buffers records and writes one pretty-printed document on `finish`.
pub struct JsonReporter<W: Write> {
    out: W,
    roots: Vec<PathBuf>,
    records: Vec<FileRecord>,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W, roots: Vec<PathBuf>) -> Self {
        Self {
            out,
            roots,
            records: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn emit(&mut self, record: &FileRecord) -> io::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &Summary) -> io::Result<()> {
        let report = ScanReport {
            version: env!("CARGO_PKG_VERSION"),
            scanned_at: chrono::Utc::now().to_rfc3339(),
            roots: &self.roots,
            summary,
            records: &self.records,
        };
        serde_json::to_writer_pretty(&mut self.out, &report)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
