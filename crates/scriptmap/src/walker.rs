//! Directory traversal and file classification.
//!
//! Enumerates the files of interest under a root: `.ksh`/`.sh` scripts and
//! `.ctl` control files, matched on lowercased extension. Traversal is
//! depth-first; hidden entries are skipped and symbolic links are not
//! followed (guarding against cycles). Unreadable directories and entries
//! are recorded as warnings and skipped, never fatal.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result, ScanWarning};
use crate::types::{FileKind, Language};

/// Which file kinds a walk should collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkKinds {
    pub scripts: bool,
    pub control_files: bool,
}

impl WalkKinds {
    /// Collect scripts only.
    #[must_use]
    pub fn scripts() -> Self {
        Self {
            scripts: true,
            control_files: false,
        }
    }

    /// Collect control files only.
    #[must_use]
    pub fn control_files() -> Self {
        Self {
            scripts: false,
            control_files: true,
        }
    }
}

/// Classify a path by its lowercased extension.
///
/// Returns `None` for everything that is neither a script nor a control file.
#[must_use]
pub fn classify_path(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_str()?;
    if let Some(language) = Language::from_extension(ext) {
        return Some(FileKind::Script(language));
    }
    if ext.eq_ignore_ascii_case("ctl") {
        return Some(FileKind::ControlFile);
    }
    None
}

/// Walk `root` depth-first, collecting files of the requested kinds.
///
/// Fails with [`Error::InputNotFound`] when the root itself is missing or
/// not a directory; everything below that is warn-and-skip, with warnings
/// appended to `warnings`.
pub fn walk(
    root: &Path,
    kinds: WalkKinds,
    warnings: &mut Vec<ScanWarning>,
) -> Result<Vec<(PathBuf, FileKind)>> {
    if !root.is_dir() {
        return Err(Error::InputNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    walk_dir(root, kinds, &mut files, warnings);
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Recursively walk one directory.
fn walk_dir(
    dir: &Path,
    kinds: WalkKinds,
    files: &mut Vec<(PathBuf, FileKind)>,
    warnings: &mut Vec<ScanWarning>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(
                directory = %dir.display(),
                error = %e,
                "Cannot read directory, skipping"
            );
            warnings.push(ScanWarning::unreadable(dir.to_path_buf(), &e));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(
                    directory = %dir.display(),
                    error = %e,
                    "Failed to read directory entry, skipping"
                );
                warnings.push(ScanWarning::unreadable(dir.to_path_buf(), &e));
                continue;
            }
        };

        let path = entry.path();

        // Skip hidden files and directories
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                continue;
            }
        }

        // Do not follow symlinks; a link cycle would otherwise walk forever
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot stat entry, skipping");
                warnings.push(ScanWarning::unreadable(path.clone(), &e));
                continue;
            }
        };
        if metadata.file_type().is_symlink() {
            continue;
        }

        if metadata.is_dir() {
            walk_dir(&path, kinds, files, warnings);
        } else if metadata.is_file() {
            if let Some(kind) = classify_path(&path) {
                let wanted = match kind {
                    FileKind::Script(_) => kinds.scripts,
                    FileKind::ControlFile => kinds.control_files,
                };
                if wanted {
                    files.push((path, kind));
                }
            }
        }
    }
}
