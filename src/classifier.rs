//! Format classification.
//!
//! Identity is decided in two steps. The extension is consulted first and,
//! if registered, wins outright: no bytes are read. Otherwise the leading
//! bytes of the file are read once and the header rules are tried in
//! registry order; the first rule that matches wins.

use crate::outcome::MatchBasis;
use crate::registry::{FormatDescriptor, HeaderRule, Inflate, Registry};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// The format a file was identified as, and how.
#[derive(Debug, Clone)]
pub struct Classification {
    pub format: Option<Arc<FormatDescriptor>>,
    pub basis: MatchBasis,
}

impl Classification {
    fn unresolved() -> Self {
        Self {
            format: None,
            basis: MatchBasis::None,
        }
    }

    fn matched(format: &Arc<FormatDescriptor>, basis: MatchBasis) -> Self {
        Self {
            format: Some(Arc::clone(format)),
            basis,
        }
    }
}

/// Classifies paths against a shared registry.
#[derive(Debug, Clone)]
pub struct Classifier {
    registry: Arc<Registry>,
}

impl Classifier {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Identify the format of `path`.
    ///
    /// Only I/O errors while reading the header are returned as `Err`; a file
    /// nothing matches is `Ok` with no format.
    pub fn classify(&self, path: &Path) -> io::Result<Classification> {
        if let Some(extension) = normalized_extension(path)
            && let Some(format) = self.registry.lookup_by_extension(&extension)
        {
            return Ok(Classification::matched(format, MatchBasis::Extension));
        }

        let rules = self.registry.ordered_header_rules();
        if rules.is_empty() {
            return Ok(Classification::unresolved());
        }

        let prefix = read_prefix(File::open(path)?, self.registry.probe_len())?;
        let matched = first_match(rules, &prefix, |need| inflate_prefix(path, need));
        Ok(match matched {
            Some(format) => Classification::matched(format, MatchBasis::Header),
            None => Classification::unresolved(),
        })
    }
}

/// The lowercase extension of `path` with its leading dot.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn normalized_extension(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if extension.is_empty() {
        return None;
    }
    Some(format!(".{}", extension.to_lowercase()))
}

/// Try `rules` in order against the raw prefix.
///
/// Inflating rules are evaluated against a decompressed prefix obtained from
/// `inflate`, which is called at most once and only if the raw prefix looks
/// like a gzip stream.
fn first_match<'a>(
    rules: &'a [HeaderRule],
    raw: &[u8],
    mut inflate: impl FnMut(usize) -> Vec<u8>,
) -> Option<&'a Arc<FormatDescriptor>> {
    let inflated_span = rules
        .iter()
        .filter(|rule| rule.inflate.is_some())
        .map(HeaderRule::span)
        .max()
        .unwrap_or(0);
    let mut inflated: Option<Vec<u8>> = None;

    for rule in rules {
        let matched = match rule.inflate {
            None => rule.matches(raw),
            Some(Inflate::Gzip) => {
                if !raw.starts_with(GZIP_MAGIC) {
                    continue;
                }
                let bytes = inflated.get_or_insert_with(|| inflate(inflated_span));
                rule.matches(bytes)
            }
        };
        if matched {
            return Some(&rule.format);
        }
    }
    None
}

fn read_prefix(reader: impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Decompress up to `need` bytes from the start of a gzip file.
///
/// A corrupt or truncated stream yields whatever was decoded before the
/// error, which may be too short for any rule to match.
fn inflate_prefix(path: &Path, need: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(need);
    if let Ok(file) = File::open(path) {
        let _ = MultiGzDecoder::new(file)
            .take(need as u64)
            .read_to_end(&mut buf);
    }
    buf
}
