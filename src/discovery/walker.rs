//! Deterministic directory traversal.
//!
//! Entries are yielded depth-first with siblings sorted by file name, so two
//! runs over the same tree see the same sequence. Excluded directories and
//! directories marked `recurse = false` are pruned before they are read.

use crate::registry::PathOverride;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkConfig {
    /// Directory names that are never descended into, wherever they appear.
    pub excluded_dirs: Vec<String>,
    /// Whether to descend into symlinked directories.
    pub follow_symlinks: bool,
}

impl WalkConfig {
    pub fn new(excluded_dirs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            excluded_dirs: excluded_dirs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

/// One item produced by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    /// A path to classify and verify.
    File(PathBuf),
    /// A directory entry that could not be read.
    Error { path: PathBuf, message: String },
}

impl WalkEntry {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Error { path, .. } => path,
        }
    }
}

/// Directory walker with optional pruning overrides.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    config: WalkConfig,
    pruned: Vec<PathOverride>,
}

impl DirectoryWalker {
    pub fn new(config: WalkConfig) -> Self {
        Self {
            config,
            pruned: Vec::new(),
        }
    }

    /// Keep the overrides that stop recursion.
    pub fn with_overrides<'a>(mut self, overrides: impl IntoIterator<Item = &'a PathOverride>) -> Self {
        self.pruned = overrides
            .into_iter()
            .filter(|o| !o.recurse)
            .cloned()
            .collect();
        self
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let excluded = entry
            .file_name()
            .to_str()
            .is_some_and(|name| self.config.excluded_dirs.iter().any(|d| d == name));
        if excluded {
            debug!(path = %entry.path().display(), "Skipping excluded directory");
            return true;
        }
        if let Some(rule) = self.pruned.iter().find(|o| o.matches(entry.path())) {
            debug!(path = %entry.path().display(), rule = %rule.pattern, "Not recursing into directory");
            return true;
        }
        false
    }

    /// Walk `root` and yield every file below it (or `root` itself if it is a file).
    pub fn walk<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = WalkEntry> + 'a {
        WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| !self.is_pruned(e))
            .filter_map(move |result| match result {
                Ok(entry) => Self::to_entry(entry),
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.to_path_buf());
                    Some(WalkEntry::Error {
                        path,
                        message: e.to_string(),
                    })
                }
            })
    }

    fn to_entry(entry: DirEntry) -> Option<WalkEntry> {
        let file_type = entry.file_type();
        if file_type.is_file() {
            return Some(WalkEntry::File(entry.into_path()));
        }
        if file_type.is_symlink() {
            // Only reached when links are not followed.
            return match fs::metadata(entry.path()) {
                Ok(target) if target.is_dir() => {
                    debug!(path = %entry.path().display(), "Not following symlinked directory");
                    None
                }
                // Dangling links are reported so that the breakage is visible.
                _ => Some(WalkEntry::File(entry.into_path())),
            };
        }
        if !file_type.is_dir() {
            debug!(path = %entry.path().display(), "Skipping special file");
        }
        None
    }
}
