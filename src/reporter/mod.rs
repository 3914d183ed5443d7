pub mod event;
pub mod json;
pub mod terminal;

use crate::aggregator::Summary;
use crate::outcome::FileRecord;
use std::io;

/// Receives records in emission order, then the run totals.
pub trait Reporter {
    fn emit(&mut self, record: &FileRecord) -> io::Result<()>;
    fn finish(&mut self, summary: &Summary) -> io::Result<()>;
}
