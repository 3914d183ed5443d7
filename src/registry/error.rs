//! Registry validation errors.

/// A problem with the format registry that prevents any scan from starting.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("extension '{extension}' is claimed by both '{first}' and '{second}'")]
    DuplicateExtension {
        extension: String,
        first: String,
        second: String,
    },

    #[error("format id '{0}' is defined more than once")]
    DuplicateId(String),

    #[error("format '{format}': extension '{extension}' must start with '.' and contain no '/'")]
    InvalidExtension { format: String, extension: String },

    #[error("format '{format}' references unknown handler '{handler}'")]
    UnknownHandler { format: String, handler: String },

    #[error("format '{format}' references unknown container '{container}'")]
    UnknownContainer { format: String, container: String },

    #[error("format '{format}' has an empty header pattern")]
    EmptyHeader { format: String },

    #[error("format '{format}': header '{header}' is not valid hex")]
    InvalidHeader { format: String, header: String },

    #[error("format '{format}' can never be detected (no extension and no header)")]
    NoAutodetect { format: String },

    #[error("format '{format}' has no description")]
    EmptyDescription { format: String },

    #[error("format without extension or id has no way to be named")]
    Unnamed,

    #[error("handler '{0}' has an empty argv")]
    EmptyArgv(String),

    #[error("handler '{0}' has an empty fail_if_stderr token")]
    EmptyStderrToken(String),

    #[error("handler '{0}' shadows a built-in handler of the same name")]
    BuiltinShadowed(String),

    #[error("format '{format}': unsupported header_inflate codec '{codec}'")]
    UnsupportedInflate { format: String, codec: String },

    #[error("override has an empty path")]
    EmptyOverridePath,

    #[error("override '{0}' must start with '/' or '*/'")]
    RelativeOverridePath(String),

    #[error("override '{0}' changes nothing (no handler and recurse = true)")]
    NoopOverride(String),

    #[error("override '{path}' references unknown handler '{handler}'")]
    UnknownOverrideHandler { path: String, handler: String },
}
