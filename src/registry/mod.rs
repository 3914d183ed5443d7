//! The format registry.
//!
//! Built once from a [`Config`] before any file is touched, then shared
//! read-only (behind an `Arc`) by every worker. Construction validates the
//! whole table, so a registry that exists is one the classifier and invoker
//! can trust:
//!
//! - every extension maps to at most one format
//! - every format can be reached by extension or by header
//! - every handler and container reference resolves
//! - header rules keep the order they were declared in

mod error;
mod handler;

pub use error::RegistryError;
pub use handler::{
    BUILTIN_HANDLERS, DecodeKind, HandlerKind, HandlerSpec, QueryKind, SubprocessSpec, is_builtin,
};

use crate::config::{Config, FiletypeConfig, HandlerConfig, OverrideConfig};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Everything known about one file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub id: String,
    pub description: String,
    /// Lowercase extensions including the leading dot.
    pub extensions: Vec<String>,
    /// Id of the enclosing format, for formats such as `.cbz` or `.tgz`.
    pub container: Option<String>,
    pub handler: HandlerSpec,
}

/// Decompression applied to a file's leading bytes before matching a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inflate {
    Gzip,
}

/// A magic-number rule: the format is identified if any of `magic` occurs
/// at `offset` in the (optionally inflated) file prefix.
#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub format: Arc<FormatDescriptor>,
    pub offset: usize,
    pub magic: Vec<Vec<u8>>,
    pub inflate: Option<Inflate>,
}

impl HeaderRule {
    /// Number of leading bytes this rule needs to see.
    pub fn span(&self) -> usize {
        self.offset + self.magic.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn matches(&self, prefix: &[u8]) -> bool {
        let Some(window) = prefix.get(self.offset..) else {
            return false;
        };
        self.magic.iter().any(|magic| window.starts_with(magic))
    }
}

/// A path-based exception to normal handling.
#[derive(Debug, Clone)]
pub struct PathOverride {
    pub pattern: String,
    /// Suffix (for `*/...` patterns) or full path the pattern matches.
    needle: String,
    suffix: bool,
    pub message: Option<String>,
    pub handler: Option<HandlerSpec>,
    pub recurse: bool,
}

impl PathOverride {
    pub fn matches(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        let normalized = if std::path::MAIN_SEPARATOR == '/' {
            text
        } else {
            text.replace(std::path::MAIN_SEPARATOR, "/").into()
        };
        if self.suffix {
            normalized.ends_with(&self.needle)
        } else {
            normalized == self.needle
        }
    }

    /// Whether matching files are reported as skipped without classification.
    pub fn skips(&self) -> bool {
        matches!(
            self.handler,
            Some(HandlerSpec {
                kind: HandlerKind::Skip,
                ..
            })
        )
    }
}

/// The validated, immutable format table.
#[derive(Debug, Clone)]
pub struct Registry {
    formats: Vec<Arc<FormatDescriptor>>,
    by_extension: HashMap<String, Arc<FormatDescriptor>>,
    header_rules: Vec<HeaderRule>,
    overrides: Vec<PathOverride>,
    probe_len: usize,
}

impl Registry {
    /// Validate `config` and build the lookup tables.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        validate_handlers(&config.handlers)?;

        let mut formats = Vec::with_capacity(config.filetypes.len());
        let mut by_extension: HashMap<String, Arc<FormatDescriptor>> = HashMap::new();
        let mut header_rules = Vec::new();
        let mut ids = HashSet::new();

        for filetype in &config.filetypes {
            let extensions = normalize_extensions(filetype)?;
            let id = filetype
                .id
                .clone()
                .or_else(|| extensions.first().map(|e| e.trim_start_matches('.').to_string()))
                .ok_or(RegistryError::Unnamed)?;

            if filetype.description.trim().is_empty() {
                return Err(RegistryError::EmptyDescription { format: id });
            }
            if !ids.insert(id.clone()) {
                return Err(RegistryError::DuplicateId(id));
            }

            let handler = resolve_handler(
                &filetype.handler,
                &filetype.description,
                filetype.multipage,
                &config.handlers,
            )
            .ok_or_else(|| RegistryError::UnknownHandler {
                format: id.clone(),
                handler: filetype.handler.clone(),
            })?
            .with_temporary_dir(filetype.use_temporary_dir);

            let magic = decode_headers(&id, filetype)?;
            if extensions.is_empty() && magic.is_empty() {
                return Err(RegistryError::NoAutodetect { format: id });
            }
            let inflate = match filetype.header_inflate.as_deref() {
                None => None,
                Some("gzip") => Some(Inflate::Gzip),
                Some(other) => {
                    return Err(RegistryError::UnsupportedInflate {
                        format: id,
                        codec: other.to_string(),
                    });
                }
            };

            let descriptor = Arc::new(FormatDescriptor {
                id: id.clone(),
                description: filetype.description.clone(),
                extensions: extensions.clone(),
                container: filetype.container.clone(),
                handler,
            });

            for extension in extensions {
                if let Some(existing) = by_extension.get(&extension) {
                    return Err(RegistryError::DuplicateExtension {
                        extension,
                        first: existing.id.clone(),
                        second: id,
                    });
                }
                by_extension.insert(extension, Arc::clone(&descriptor));
            }

            if !magic.is_empty() {
                header_rules.push(HeaderRule {
                    format: Arc::clone(&descriptor),
                    offset: filetype.header_offset,
                    magic,
                    inflate,
                });
            }
            formats.push(descriptor);
        }

        for format in &formats {
            if let Some(container) = &format.container
                && !ids.contains(container)
            {
                return Err(RegistryError::UnknownContainer {
                    format: format.id.clone(),
                    container: container.clone(),
                });
            }
        }

        let overrides = config
            .overrides
            .iter()
            .map(|o| build_override(o, &config.handlers))
            .collect::<Result<Vec<_>, _>>()?;

        let probe_len = header_rules
            .iter()
            .filter(|rule| rule.inflate.is_none())
            .map(HeaderRule::span)
            .max()
            .unwrap_or(0);

        Ok(Self {
            formats,
            by_extension,
            header_rules,
            overrides,
            probe_len,
        })
    }

    /// The registry shipped with the binary.
    pub fn builtin() -> crate::error::Result<Self> {
        Ok(Self::from_config(&Config::builtin()?)?)
    }

    /// Look up a normalized (lowercase, dot-prefixed) extension.
    pub fn lookup_by_extension(&self, extension: &str) -> Option<&Arc<FormatDescriptor>> {
        self.by_extension.get(extension)
    }

    /// Header rules in probe order.
    pub fn ordered_header_rules(&self) -> &[HeaderRule] {
        &self.header_rules
    }

    /// Raw bytes needed to evaluate every non-inflating header rule.
    pub fn probe_len(&self) -> usize {
        self.probe_len
    }

    pub fn overrides(&self) -> &[PathOverride] {
        &self.overrides
    }

    /// The first override matching `path`, if any.
    pub fn override_for(&self, path: &Path) -> Option<&PathOverride> {
        self.overrides.iter().find(|o| o.matches(path))
    }

    pub fn formats(&self) -> &[Arc<FormatDescriptor>] {
        &self.formats
    }

    /// Every registered extension, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

fn validate_handlers(handlers: &BTreeMap<String, HandlerConfig>) -> Result<(), RegistryError> {
    for (name, handler) in handlers {
        if is_builtin(name) {
            return Err(RegistryError::BuiltinShadowed(name.clone()));
        }
        if handler.argv.first().is_none_or(|program| program.is_empty()) {
            return Err(RegistryError::EmptyArgv(name.clone()));
        }
        if handler
            .fail_if_stderr
            .as_deref()
            .is_some_and(str::is_empty)
        {
            return Err(RegistryError::EmptyStderrToken(name.clone()));
        }
    }
    Ok(())
}

fn resolve_handler(
    name: &str,
    description: &str,
    multipage: bool,
    handlers: &BTreeMap<String, HandlerConfig>,
) -> Option<HandlerSpec> {
    HandlerSpec::builtin(name, description, multipage).or_else(|| {
        handlers
            .get(name)
            .map(|config| HandlerSpec::subprocess(name, SubprocessSpec::from_config(config)))
    })
}

fn normalize_extensions(filetype: &FiletypeConfig) -> Result<Vec<String>, RegistryError> {
    let Some(extensions) = &filetype.extension else {
        return Ok(Vec::new());
    };
    extensions
        .as_slice()
        .iter()
        .map(|extension| {
            let is_single_segment = extension
                .strip_prefix('.')
                .is_some_and(|rest| !rest.is_empty() && !rest.contains(['.', '/']));
            if !is_single_segment {
                Err(RegistryError::InvalidExtension {
                    format: filetype
                        .id
                        .clone()
                        .unwrap_or_else(|| filetype.description.clone()),
                    extension: extension.clone(),
                })
            } else {
                Ok(extension.to_lowercase())
            }
        })
        .collect()
}

fn decode_headers(id: &str, filetype: &FiletypeConfig) -> Result<Vec<Vec<u8>>, RegistryError> {
    let Some(headers) = &filetype.header else {
        return Ok(Vec::new());
    };
    headers
        .as_slice()
        .iter()
        .map(|header| {
            if header.is_empty() {
                return Err(RegistryError::EmptyHeader {
                    format: id.to_string(),
                });
            }
            decode_hex(header).ok_or_else(|| RegistryError::InvalidHeader {
                format: id.to_string(),
                header: header.clone(),
            })
        })
        .collect()
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

fn build_override(
    config: &OverrideConfig,
    handlers: &BTreeMap<String, HandlerConfig>,
) -> Result<PathOverride, RegistryError> {
    let pattern = config.path.trim();
    if pattern.is_empty() {
        return Err(RegistryError::EmptyOverridePath);
    }
    let (needle, suffix) = if let Some(rest) = pattern.strip_prefix('*') {
        (rest.to_string(), true)
    } else {
        (pattern.to_string(), false)
    };
    if !needle.starts_with('/') {
        return Err(RegistryError::RelativeOverridePath(pattern.to_string()));
    }
    // A message is only ever shown alongside a handler's outcome.
    if config.handler.is_none() && config.recurse {
        return Err(RegistryError::NoopOverride(pattern.to_string()));
    }

    let handler = match &config.handler {
        None => None,
        Some(name) => {
            let description = config.message.as_deref().unwrap_or(name);
            let spec = resolve_handler(name, description, false, handlers).ok_or_else(|| {
                RegistryError::UnknownOverrideHandler {
                    path: pattern.to_string(),
                    handler: name.clone(),
                }
            })?;
            Some(spec)
        }
    };

    Ok(PathOverride {
        pattern: pattern.to_string(),
        needle,
        suffix,
        message: config.message.clone(),
        handler,
        recurse: config.recurse,
    })
}
