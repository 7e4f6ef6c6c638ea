//! Error types for scriptmap operations.
//!
//! Errors are categorized into two main types:
//!
//! - **`Error`**: Top-level errors that halt a scan (store failures, etc.)
//! - **`ScanWarning`**: File-level problems that are collected but don't halt scanning
//!
//! ## Error Philosophy
//!
//! scriptmap follows a "best effort" approach for scanning:
//! - A single unreadable or malformed script shouldn't prevent indexing the rest
//! - Per-file problems are collected on the scan report, not thrown
//! - Only infrastructure failures (store, input root missing) cause early termination
//! - Ambiguity and unresolution are recorded on the edge, never raised

use std::path::PathBuf;
use thiserror::Error;

/// Result type for scriptmap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for scriptmap operations.
///
/// These errors represent infrastructure failures that prevent
/// the operation from completing.
#[derive(Debug, Error)]
pub enum Error {
    /// An input root directory does not exist or is not a directory
    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    /// Store operation failed
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The store on disk was written by a newer scriptmap
    #[error("store schema version {found} is newer than supported version {supported}")]
    StoreIncompatible { found: i64, supported: i64 },

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scan was cancelled before completion
    #[error("scan cancelled")]
    Cancelled,

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// Invariant violation inside scriptmap itself
    #[error("internal error: {0}")]
    Internal(String),
}

/// A per-file problem encountered while scanning.
///
/// These are collected on the [`ScanReport`](crate::ScanReport) but don't halt
/// the scan. The analyzer continues with remaining files and reports all
/// warnings at the end.
#[derive(Debug, Clone)]
pub struct ScanWarning {
    /// Path of the file (or directory) that produced the warning
    pub path: PathBuf,
    /// Category of the problem
    pub kind: ScanWarningKind,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for ScanWarning {}

/// Categorization of per-file scan warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanWarningKind {
    /// The file or directory could not be read (permissions, vanished mid-scan)
    InputUnreadable,

    /// The file contained invalid UTF-8; it was decoded lossily and parsed anyway
    InvalidEncoding,

    /// The file's structure confused the lexer (e.g. unterminated heredoc);
    /// the remainder was classified conservatively
    ParseAnomaly,
}

impl ScanWarningKind {
    /// Stable string form used in report rendering.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputUnreadable => "input unreadable",
            Self::InvalidEncoding => "invalid encoding",
            Self::ParseAnomaly => "parse anomaly",
        }
    }
}

impl std::fmt::Display for ScanWarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScanWarning {
    /// Create a new scan warning.
    #[must_use]
    pub fn new(path: PathBuf, kind: ScanWarningKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create an unreadable-input warning from an I/O error.
    #[must_use]
    pub fn unreadable(path: PathBuf, error: &std::io::Error) -> Self {
        Self::new(path, ScanWarningKind::InputUnreadable, error.to_string())
    }

    /// Create an invalid-encoding warning.
    #[must_use]
    pub fn invalid_encoding(path: PathBuf) -> Self {
        Self::new(
            path,
            ScanWarningKind::InvalidEncoding,
            "file is not valid UTF-8; decoded with replacement characters",
        )
    }

    /// Create a parse-anomaly warning.
    #[must_use]
    pub fn parse_anomaly(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(path, ScanWarningKind::ParseAnomaly, message)
    }
}
