//! Control-file CRUD operations for the scriptmap index.

use std::path::Path;

use rusqlite::{params, OptionalExtension};

use super::{row_to_control_file, Store, CONTROL_FILES_COLUMNS};
use crate::error::Result;
use crate::types::{ControlFile, ControlFileId};

impl Store {
    /// Insert or update a control-file record, returning its ID.
    ///
    /// Identity key is the absolute path.
    pub fn upsert_control_file(
        &self,
        path: &Path,
        basename: &str,
        size_bytes: u64,
        scanned_at: i64,
    ) -> Result<ControlFileId> {
        let conn = self.connection()?;
        let path_str = path.to_string_lossy();

        let updated = conn.execute(
            "UPDATE control_files SET basename = ?2, size_bytes = ?3, stale = 0, scanned_at = ?4
             WHERE path = ?1",
            params![path_str, basename, size_bytes as i64, scanned_at],
        )?;

        let id = if updated > 0 {
            conn.query_row(
                "SELECT id FROM control_files WHERE path = ?1",
                [&path_str],
                |row| row.get::<_, i64>(0),
            )?
        } else {
            conn.execute(
                "INSERT INTO control_files (path, basename, size_bytes, stale, scanned_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![path_str, basename, size_bytes as i64, scanned_at],
            )?;
            conn.last_insert_rowid()
        };

        Ok(ControlFileId::from(id))
    }

    /// Get a control file by absolute path.
    pub fn get_control_file_by_path(&self, path: &Path) -> Result<Option<ControlFile>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {CONTROL_FILES_COLUMNS} FROM control_files WHERE path = ?1"),
            [path.to_string_lossy()],
            row_to_control_file,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get a control file by its database ID.
    pub fn get_control_file_by_id(&self, id: ControlFileId) -> Result<Option<ControlFile>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {CONTROL_FILES_COLUMNS} FROM control_files WHERE id = ?1"),
            [id.as_i64()],
            row_to_control_file,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get all control files with the given basename, ordered by path.
    pub fn get_control_files_by_basename(&self, basename: &str) -> Result<Vec<ControlFile>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTROL_FILES_COLUMNS} FROM control_files WHERE basename = ?1 ORDER BY path"
        ))?;

        let files = stmt
            .query_map([basename], row_to_control_file)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(files)
    }

    /// Get all indexed control files, ordered by path.
    pub fn list_all_control_files(&self) -> Result<Vec<ControlFile>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTROL_FILES_COLUMNS} FROM control_files ORDER BY path"
        ))?;

        let files = stmt
            .query_map([], row_to_control_file)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(files)
    }

    /// Mark every control file not seen by the current scan as stale.
    pub fn mark_unseen_control_files_stale(&self, scan_started_at: i64) -> Result<usize> {
        let conn = self.connection()?;

        let count = conn.execute(
            "UPDATE control_files SET stale = 1 WHERE scanned_at < ?1 AND stale = 0",
            [scan_started_at],
        )?;
        Ok(count)
    }

    /// Delete every control file not seen by the current scan (pruning scan).
    pub fn prune_unseen_control_files(&self, scan_started_at: i64) -> Result<usize> {
        let conn = self.connection()?;

        let count = conn.execute(
            "DELETE FROM control_files WHERE scanned_at < ?1",
            [scan_started_at],
        )?;
        Ok(count)
    }
}
