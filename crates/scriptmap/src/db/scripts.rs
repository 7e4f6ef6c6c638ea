//! Script CRUD operations for the scriptmap index.

use std::path::Path;

use rusqlite::{params, OptionalExtension};

use super::{row_to_script, Store, SCRIPTS_COLUMNS};
use crate::error::Result;
use crate::types::{Language, Script, ScriptId};

impl Store {
    /// Insert or update a script record, returning the script ID.
    ///
    /// Identity key is the absolute path. An existing row is updated in
    /// place (and un-marked stale); `scanned_at` records which scan last saw
    /// the file, driving the stale lifecycle.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_script(
        &self,
        path: &Path,
        basename: &str,
        language: Language,
        size_bytes: u64,
        mtime_ns: i64,
        line_count: u32,
        scanned_at: i64,
    ) -> Result<ScriptId> {
        let conn = self.connection()?;
        let path_str = path.to_string_lossy();

        let updated = conn.execute(
            "UPDATE scripts SET basename = ?2, language = ?3, size_bytes = ?4, mtime_ns = ?5,
             line_count = ?6, stale = 0, scanned_at = ?7 WHERE path = ?1",
            params![
                path_str,
                basename,
                language.as_str(),
                size_bytes as i64,
                mtime_ns,
                line_count,
                scanned_at
            ],
        )?;

        let id = if updated > 0 {
            conn.query_row("SELECT id FROM scripts WHERE path = ?1", [&path_str], |row| {
                row.get::<_, i64>(0)
            })?
        } else {
            conn.execute(
                "INSERT INTO scripts (path, basename, language, size_bytes, mtime_ns, line_count, stale, scanned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
                params![
                    path_str,
                    basename,
                    language.as_str(),
                    size_bytes as i64,
                    mtime_ns,
                    line_count,
                    scanned_at
                ],
            )?;
            conn.last_insert_rowid()
        };

        Ok(ScriptId::from(id))
    }

    /// Get a script by absolute path.
    pub fn get_script_by_path(&self, path: &Path) -> Result<Option<Script>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {SCRIPTS_COLUMNS} FROM scripts WHERE path = ?1"),
            [path.to_string_lossy()],
            row_to_script,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get a script by its database ID.
    pub fn get_script_by_id(&self, id: ScriptId) -> Result<Option<Script>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {SCRIPTS_COLUMNS} FROM scripts WHERE id = ?1"),
            [id.as_i64()],
            row_to_script,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get all scripts with the given basename, ordered by path.
    pub fn get_scripts_by_basename(&self, basename: &str) -> Result<Vec<Script>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SCRIPTS_COLUMNS} FROM scripts WHERE basename = ?1 ORDER BY path"
        ))?;

        let scripts = stmt
            .query_map([basename], row_to_script)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(scripts)
    }

    /// Get all indexed scripts, ordered by path.
    pub fn list_all_scripts(&self) -> Result<Vec<Script>> {
        let conn = self.connection()?;

        let mut stmt =
            conn.prepare(&format!("SELECT {SCRIPTS_COLUMNS} FROM scripts ORDER BY path"))?;

        let scripts = stmt
            .query_map([], row_to_script)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(scripts)
    }

    /// Mark every script not seen by the current scan as stale.
    ///
    /// Returns the number of scripts newly marked.
    pub fn mark_unseen_scripts_stale(&self, scan_started_at: i64) -> Result<usize> {
        let conn = self.connection()?;

        let count = conn.execute(
            "UPDATE scripts SET stale = 1 WHERE scanned_at < ?1 AND stale = 0",
            [scan_started_at],
        )?;
        Ok(count)
    }

    /// Delete every script not seen by the current scan (pruning scan).
    ///
    /// Outbound edges cascade.
    pub fn prune_unseen_scripts(&self, scan_started_at: i64) -> Result<usize> {
        let conn = self.connection()?;

        let count = conn.execute("DELETE FROM scripts WHERE scanned_at < ?1", [scan_started_at])?;
        Ok(count)
    }
}
