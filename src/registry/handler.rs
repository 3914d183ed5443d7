//! Handler specifications.
//!
//! A [`HandlerSpec`] is the resolved, ready-to-run form of a filetype's
//! `handler = "..."` reference: either one of the built-in checks compiled
//! into rotscan or an external command template.

use crate::config::HandlerConfig;

/// Built-in handlers, in the order `--list-builtins` prints them.
pub const BUILTIN_HANDLERS: &[(&str, &str)] = &[
    ("gzip", "Decompress the whole stream and check every member CRC"),
    ("zip", "Decompress every member and check its CRC"),
    ("json", "Parse the document as JSON"),
    ("toml", "Parse the document as TOML"),
    ("image", "Decode the image (first frame only for multi-frame formats)"),
    ("sqlite3", "Open read-only and run PRAGMA integrity_check"),
    ("text", "Read the file; plaintext has no integrity data"),
    ("unverifiable", "Read the file; the format has no integrity data"),
    ("ignore", "Do not check the file"),
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_HANDLERS.iter().any(|(builtin, _)| *builtin == name)
}

/// Built-in checks that decode the whole file in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    Gzip,
    Zip,
    Json,
    Toml,
    Image { multipage: bool },
}

/// Built-in checks that ask an embedded engine to validate its own structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Sqlite,
}

/// An external command run once per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessSpec {
    /// Command template; `argv[0]` is the executable.
    pub argv: Vec<String>,
    /// Text on stderr that marks the run as failed even on exit status 0.
    pub fail_if_stderr: Option<String>,
    /// Run with a fresh scratch directory as the working directory.
    pub use_temporary_dir: bool,
}

impl SubprocessSpec {
    pub fn from_config(config: &HandlerConfig) -> Self {
        Self {
            argv: config.argv.clone(),
            fail_if_stderr: config.fail_if_stderr.clone(),
            use_temporary_dir: config.use_temporary_dir,
        }
    }

    /// The executable name, as written in the template.
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

/// How a handler turns a file into an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKind {
    /// Run an external tool; exit status 0 means ok.
    Subprocess(SubprocessSpec),
    /// Decode the whole file in-process; any decode error is a failure.
    StreamingDecode(DecodeKind),
    /// Open the file with an engine that can check itself.
    StructuralQuery(QueryKind),
    /// Prove the file is readable, then report it as unverifiable.
    BestEffortRead { description: String },
    /// Do not touch the file.
    Skip,
}

/// A resolved handler, ready to be invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    /// The id the handler was referenced by.
    pub name: String,
    pub kind: HandlerKind,
}

impl HandlerSpec {
    /// Resolve a built-in handler by name for a format with the given traits.
    pub fn builtin(name: &str, description: &str, multipage: bool) -> Option<Self> {
        let kind = match name {
            "gzip" => HandlerKind::StreamingDecode(DecodeKind::Gzip),
            "zip" => HandlerKind::StreamingDecode(DecodeKind::Zip),
            "json" => HandlerKind::StreamingDecode(DecodeKind::Json),
            "toml" => HandlerKind::StreamingDecode(DecodeKind::Toml),
            "image" => HandlerKind::StreamingDecode(DecodeKind::Image { multipage }),
            "sqlite3" => HandlerKind::StructuralQuery(QueryKind::Sqlite),
            "text" | "unverifiable" => HandlerKind::BestEffortRead {
                description: description.to_string(),
            },
            "ignore" => HandlerKind::Skip,
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            kind,
        })
    }

    pub fn subprocess(name: &str, spec: SubprocessSpec) -> Self {
        Self {
            name: name.to_string(),
            kind: HandlerKind::Subprocess(spec),
        }
    }

    /// Force a scratch working directory for subprocess handlers.
    pub(crate) fn with_temporary_dir(mut self, enabled: bool) -> Self {
        if enabled && let HandlerKind::Subprocess(spec) = &mut self.kind {
            spec.use_temporary_dir = true;
        }
        self
    }
}
