//! Parallel file parsing infrastructure.
//!
//! Parsing is fanned out across a `rayon` worker pool while persistence is
//! funneled through the store's single writer:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Analyzer::analyze                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Phase 1 (Parallel):    rayon par_iter() lex + extract      │
//! │  Phase 2 (Sequential):  register scripts and control files  │
//! │  Phase 3 (Sequential):  resolve references, replace edges   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ParsedScript`] is the transfer type between the worker pool and the
//! writer: everything a worker extracted from one file, owned, so it can
//! cross the thread boundary.

use std::path::PathBuf;

use crate::error::ScanWarning;
use crate::extract::{InactiveRef, RawReference};
use crate::types::Language;

/// Parsed script data ready for resolution and persistence.
#[derive(Debug)]
pub struct ParsedScript {
    /// Absolute path of the script
    pub path: PathBuf,
    /// Shell dialect, by extension
    pub language: Language,
    /// File size in bytes
    pub size_bytes: u64,
    /// File modification time in nanoseconds since the Unix epoch
    pub mtime_ns: i64,
    /// Number of lines in the file
    pub line_count: u32,
    /// Raw references extracted from active lines and heredoc bodies
    pub references: Vec<RawReference>,
    /// Would-be references found on comment lines
    pub inactive: Vec<InactiveRef>,
    /// Warnings produced while reading or lexing this file
    pub warnings: Vec<ScanWarning>,
}

impl ParsedScript {
    /// Final path component of the script.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Directory containing the script, used for relative-path resolution.
    #[must_use]
    pub fn dir(&self) -> &std::path::Path {
        self.path.parent().unwrap_or_else(|| std::path::Path::new("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_and_dir_come_from_path() {
        let parsed = ParsedScript {
            path: PathBuf::from("/jobs/daily/run.ksh"),
            language: Language::Ksh,
            size_bytes: 10,
            mtime_ns: 1,
            line_count: 3,
            references: Vec::new(),
            inactive: Vec::new(),
            warnings: Vec::new(),
        };

        assert_eq!(parsed.basename(), "run.ksh");
        assert_eq!(parsed.dir(), std::path::Path::new("/jobs/daily"));
    }
}
