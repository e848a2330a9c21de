//! Error types for toolpin-core.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for toolpin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`], used by callers to decide whether
/// retrying an `ensure` call makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broken registry entry or catalog. Fix the declaration.
    Configuration,
    /// Digest of a downloaded artifact did not match its declaration.
    Integrity,
    /// Network or external build failure.
    Transient,
    /// Local filesystem operation failed.
    Filesystem,
    /// Cache state that cannot be repaired without an operator.
    Invariant,
    /// The caller cancelled the operation.
    Cancelled,
}

/// Main error type for toolpin operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Tool name is not registered.
    #[error("Unknown tool '{name}'")]
    #[diagnostic(
        code(toolpin::registry::unknown_tool),
        help("Register the tool before ensuring it")
    )]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// Two registry entries share a name.
    #[error("Tool '{name}' is registered more than once")]
    #[diagnostic(code(toolpin::registry::duplicate_tool))]
    DuplicateTool {
        /// The duplicated tool name.
        name: String,
    },

    /// Tool has no source for the requested platform.
    #[error("Tool '{tool}' is not available for platform {platform}")]
    #[diagnostic(code(toolpin::tools::incompatible_platform))]
    IncompatiblePlatform {
        /// The tool name.
        tool: String,
        /// The requested platform.
        platform: String,
    },

    /// Invalid tool declaration.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(toolpin::config::invalid))]
    Configuration {
        /// What is wrong with the declaration.
        message: String,
    },

    /// Catalog file could not be parsed.
    #[error("Invalid tool catalog {}: {message}", path.display())]
    #[diagnostic(code(toolpin::config::catalog))]
    Catalog {
        /// The catalog file.
        path: Box<Path>,
        /// The parser message.
        message: String,
    },

    /// Digest string uses an unknown algorithm or is malformed.
    #[error("Unsupported digest '{digest}'")]
    #[diagnostic(
        code(toolpin::checksum::unsupported),
        help("Digests must look like 'sha256:<hex>' or 'sha512:<hex>'")
    )]
    UnsupportedDigest {
        /// The offending digest string.
        digest: String,
    },

    /// Artifact digest does not match its declaration.
    #[error("Digest mismatch for {subject}: expected {expected}, got {actual}")]
    #[diagnostic(code(toolpin::checksum::mismatch))]
    DigestMismatch {
        /// URL or path of the checked artifact.
        subject: String,
        /// The declared digest.
        expected: String,
        /// The computed digest.
        actual: String,
    },

    /// Download failed.
    #[error("Failed to download {url}: {message}")]
    #[diagnostic(code(toolpin::fetch::download))]
    Download {
        /// The source URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Archive could not be unpacked or lacks an expected entry.
    #[error("Failed to extract {archive}: {message}")]
    #[diagnostic(code(toolpin::fetch::extract))]
    Extraction {
        /// Archive name or URL.
        archive: String,
        /// Error message.
        message: String,
    },

    /// External package build failed.
    #[error("Failed to build {package}: {message}")]
    #[diagnostic(code(toolpin::build::failed))]
    Build {
        /// The package coordinate.
        package: String,
        /// Error message.
        message: String,
    },

    /// I/O error with path context.
    #[error("I/O error during {operation} on {}: {source}", path.display())]
    #[diagnostic(code(toolpin::io::error))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// The path where the error occurred.
        path: Box<Path>,
        /// Description of the operation that failed.
        operation: String,
    },

    /// An existing cache entry could not be removed or replaced.
    #[error("Cache entry {} cannot be removed or replaced: {source}", path.display())]
    #[diagnostic(
        code(toolpin::cache::invariant),
        help("Check permissions of the cache directory or remove the entry manually")
    )]
    Invariant {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// The cache entry.
        path: Box<Path>,
    },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled: {operation}")]
    #[diagnostic(code(toolpin::cancelled))]
    Cancelled {
        /// What was in progress.
        operation: String,
    },
}

impl Error {
    /// Create an unknown tool error.
    #[must_use]
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create an incompatible platform error.
    #[must_use]
    pub fn incompatible_platform(tool: impl Into<String>, platform: impl ToString) -> Self {
        Self::IncompatiblePlatform {
            tool: tool.into(),
            platform: platform.to_string(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a digest mismatch error.
    #[must_use]
    pub fn digest_mismatch(
        subject: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::DigestMismatch {
            subject: subject.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a download error.
    #[must_use]
    pub fn download(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error.
    #[must_use]
    pub fn extraction(archive: impl Into<String>, message: impl ToString) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.to_string(),
        }
    }

    /// Create a build error.
    #[must_use]
    pub fn build(package: impl Into<String>, message: impl ToString) -> Self {
        Self::Build {
            package: package.into(),
            message: message.to_string(),
        }
    }

    /// Create an I/O error with context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.into().into_boxed_path(),
            operation: operation.into(),
        }
    }

    /// Create an invariant violation for a cache entry that cannot be removed.
    #[must_use]
    pub fn invariant(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Invariant {
            source,
            path: path.into().into_boxed_path(),
        }
    }

    /// Create a cancellation error.
    #[must_use]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool { .. }
            | Self::DuplicateTool { .. }
            | Self::IncompatiblePlatform { .. }
            | Self::Configuration { .. }
            | Self::Catalog { .. }
            | Self::UnsupportedDigest { .. } => ErrorKind::Configuration,
            Self::DigestMismatch { .. } => ErrorKind::Integrity,
            Self::Download { .. } | Self::Extraction { .. } | Self::Build { .. } => {
                ErrorKind::Transient
            }
            Self::Io { .. } => ErrorKind::Filesystem,
            Self::Invariant { .. } => ErrorKind::Invariant,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether retrying the whole `ensure` call may succeed.
    ///
    /// Integrity failures are deliberately not retryable: a corrupted download
    /// and a tampered artifact look the same.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::Cancelled)
    }
}
