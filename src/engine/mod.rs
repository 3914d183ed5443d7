//! Per-file verification.
//!
//! The [`Engine`] takes one path from the walker to a finished
//! [`FileRecord`]: path checks, overrides, classification, then the
//! handler. Every path yields exactly one record.

use crate::classifier::Classifier;
use crate::outcome::{FileRecord, MatchBasis, Outcome};
use crate::registry::Registry;
use crate::runtime::{NeverShutdown, ShutdownCheck};
use crate::verifier::{Invoker, Verification};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// How far each file is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Classify and run the handler.
    #[default]
    Verify,
    /// Classify only; no handler is run.
    ClassifyOnly,
}

/// Classifies and verifies single files. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct Engine {
    classifier: Classifier,
    invoker: Invoker,
    mode: Mode,
}

impl Engine {
    pub fn new(registry: Arc<Registry>, invoker: Invoker, mode: Mode) -> Self {
        Self {
            classifier: Classifier::new(registry),
            invoker,
            mode,
        }
    }

    pub fn registry(&self) -> &Registry {
        self.classifier.registry()
    }

    /// Produce the record for one path.
    pub fn check(&self, path: &Path) -> FileRecord {
        self.check_until(path, &NeverShutdown)
    }

    /// Produce the record for one path, abandoning any external tool once
    /// `stop` fires.
    pub fn check_until(&self, path: &Path, stop: &dyn ShutdownCheck) -> FileRecord {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        let size = match preflight(&path) {
            Ok(size) => size,
            Err(reason) => return FileRecord::unclassified(path, 0, Outcome::path_error(reason)),
        };

        if let Some(record) = self.apply_override(&path, size, stop) {
            return record;
        }

        let classification = match self.classifier.classify(&path) {
            Ok(classification) => classification,
            Err(e) => {
                return FileRecord::unclassified(path, size, Outcome::path_error(e.to_string()));
            }
        };
        let Some(format) = classification.format else {
            debug!(path = %path.display(), "No extension or header rule matched");
            return FileRecord::unclassified(path, size, Outcome::ClassificationUnresolved);
        };

        let verification = match self.mode {
            Mode::ClassifyOnly => Verification::new(Outcome::skipped("classification only")),
            Mode::Verify => self.invoker.invoke_until(&path, &format.handler, stop),
        };

        FileRecord {
            path,
            size,
            format: Some(format.id.clone()),
            description: Some(format.description.clone()),
            basis: classification.basis,
            outcome: verification.outcome,
            diagnostic: verification.diagnostic,
        }
    }

    /// Handle paths that a configured override takes out of normal processing.
    fn apply_override(
        &self,
        path: &Path,
        size: u64,
        stop: &dyn ShutdownCheck,
    ) -> Option<FileRecord> {
        let rule = self.registry().override_for(path)?;
        let handler = rule.handler.as_ref()?;

        let (outcome, diagnostic) = if rule.skips() {
            let reason = rule.message.clone().unwrap_or_else(|| "skipped".to_string());
            (Outcome::skipped(reason), None)
        } else if self.mode == Mode::ClassifyOnly {
            (Outcome::skipped("classification only"), None)
        } else {
            let verification = self.invoker.invoke_until(path, handler, stop);
            (verification.outcome, verification.diagnostic)
        };

        Some(FileRecord {
            path: path.to_path_buf(),
            size,
            format: None,
            description: Some(rule.message.clone().unwrap_or_else(|| handler.name.clone())),
            basis: MatchBasis::Override,
            outcome,
            diagnostic,
        })
    }
}

/// Confirm `path` is a readable, non-empty regular file and return its size.
fn preflight(path: &Path) -> Result<u64, String> {
    let metadata = fs::metadata(path).map_err(|e| e.to_string())?;
    if !metadata.is_file() {
        return Err("not a regular file".to_string());
    }
    File::open(path).map_err(|e| e.to_string())?;
    if metadata.len() == 0 {
        return Err("file is empty".to_string());
    }
    Ok(metadata.len())
}

/// Absolute form of each root, in the order given.
pub fn absolute_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .map(|root| std::path::absolute(root).unwrap_or_else(|_| root.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{gzip_bytes, zip_bytes};
    use tempfile::TempDir;

    fn engine(mode: Mode) -> Engine {
        Engine::new(Arc::new(Registry::builtin().unwrap()), Invoker::default(), mode)
    }

    #[test]
    fn test_missing_path_is_path_error() {
        let record = engine(Mode::Verify).check(Path::new("/nonexistent/rotscan/file.zip"));
        assert!(matches!(record.outcome, Outcome::PathError { .. }));
        assert_eq!(record.basis, MatchBasis::None);
    }

    #[test]
    fn test_empty_file_is_path_error_regardless_of_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.zip");
        fs::write(&path, b"").unwrap();
        let record = engine(Mode::Verify).check(&path);
        assert_eq!(record.outcome, Outcome::path_error("file is empty"));
        assert!(record.format.is_none());
    }

    #[test]
    fn test_directory_is_path_error() {
        let dir = TempDir::new().unwrap();
        let record = engine(Mode::Verify).check(dir.path());
        assert_eq!(record.outcome, Outcome::path_error("not a regular file"));
    }

    #[test]
    fn test_valid_zip_is_ok() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        fs::write(&path, zip_bytes(&[("x.txt", b"contents")])).unwrap();
        let record = engine(Mode::Verify).check(&path);
        assert_eq!(record.outcome, Outcome::Ok);
        assert_eq!(record.format.as_deref(), Some("zip"));
        assert_eq!(record.basis, MatchBasis::Extension);
        assert!(record.path.is_absolute());
    }

    #[test]
    fn test_unresolved_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mystery");
        fs::write(&path, b"\x00\x01 who knows").unwrap();
        let record = engine(Mode::Verify).check(&path);
        assert_eq!(record.outcome, Outcome::ClassificationUnresolved);
    }

    #[test]
    fn test_classify_only_skips_handler() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.gz");
        fs::write(&path, b"not gzip at all").unwrap();
        let record = engine(Mode::ClassifyOnly).check(&path);
        assert_eq!(record.outcome, Outcome::skipped("classification only"));
        assert_eq!(record.format.as_deref(), Some("gzip"));
    }

    #[test]
    fn test_override_skips_known_broken_file() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("site").join("hts-cache");
        fs::create_dir_all(&cache).unwrap();
        let path = cache.join("new.zip");
        fs::write(&path, b"PK\x03\x04 truncated on purpose").unwrap();

        let record = engine(Mode::Verify).check(&path);
        assert_eq!(record.basis, MatchBasis::Override);
        assert_eq!(
            record.outcome,
            Outcome::skipped("Skipping intentionally broken HTTrack Zip file")
        );
    }

    #[test]
    fn test_check_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.gz");
        fs::write(&path, gzip_bytes(b"payload")).unwrap();
        let engine = engine(Mode::Verify);
        assert_eq!(engine.check(&path), engine.check(&path));
    }
}
