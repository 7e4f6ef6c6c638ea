//! Procedure CRUD and search operations for the scriptmap index.
//!
//! Procedures are keyed by their qualified textual form; two call sites
//! writing the same qualified text share one row. Lowercased columns back
//! the interactive substring search.

use rusqlite::{params, OptionalExtension};

use super::{row_to_procedure, Store, PROCEDURES_COLUMNS};
use crate::error::Result;
use crate::types::{Procedure, ProcedureHit, ProcedureId, ProcedureUsage};

impl Store {
    /// Insert or fetch a procedure row, returning its ID.
    pub fn upsert_procedure(
        &self,
        qualified: &str,
        schema: Option<&str>,
        package: Option<&str>,
        name: &str,
    ) -> Result<ProcedureId> {
        let conn = self.connection()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM procedures WHERE qualified = ?1",
                [qualified],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(ProcedureId::from(id));
        }

        conn.execute(
            "INSERT INTO procedures
             (qualified, qualified_lower, schema_part, package_part, name_part,
              schema_lower, package_lower, name_lower)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                qualified,
                qualified.to_lowercase(),
                schema,
                package,
                name,
                schema.map(str::to_lowercase),
                package.map(str::to_lowercase),
                name.to_lowercase()
            ],
        )?;

        Ok(ProcedureId::from(conn.last_insert_rowid()))
    }

    /// Get a procedure by its exact qualified form.
    pub fn get_procedure_by_qualified(&self, qualified: &str) -> Result<Option<Procedure>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {PROCEDURES_COLUMNS} FROM procedures WHERE qualified = ?1"),
            [qualified],
            row_to_procedure,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get a procedure by its database ID.
    pub fn get_procedure_by_id(&self, id: ProcedureId) -> Result<Option<Procedure>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {PROCEDURES_COLUMNS} FROM procedures WHERE id = ?1"),
            [id.as_i64()],
            row_to_procedure,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get all procedures, ordered by qualified form.
    pub fn list_all_procedures(&self) -> Result<Vec<Procedure>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {PROCEDURES_COLUMNS} FROM procedures ORDER BY qualified"
        ))?;

        let procedures = stmt
            .query_map([], row_to_procedure)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(procedures)
    }

    /// Case-insensitive substring search over qualified procedure forms.
    ///
    /// Returns `(procedure, calling script, line)` rows ordered by
    /// (procedure, source path, line). An empty needle returns nothing;
    /// `%`/`_` in the needle are literal, not wildcards.
    pub fn search_procedures(
        &self,
        needle: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ProcedureHit>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let escaped = needle
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");

        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT p.qualified, s.path, e.line
             FROM procedures p
             JOIN edges e ON e.target_kind = 'procedure' AND e.target_id = p.id
             JOIN scripts s ON s.id = e.source_id
             WHERE p.qualified_lower LIKE ?1 ESCAPE '\\'
             ORDER BY p.qualified, s.path, e.line
             LIMIT ?2 OFFSET ?3",
        )?;

        let hits = stmt
            .query_map(params![pattern, limit as i64, offset as i64], |row| {
                Ok(ProcedureHit {
                    qualified: row.get(0)?,
                    source_path: std::path::PathBuf::from(row.get::<_, String>(1)?),
                    line: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    /// Distinct procedures with their corpus-wide call-site counts,
    /// ordered by qualified form.
    pub fn procedure_catalog(&self) -> Result<Vec<ProcedureUsage>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.qualified, p.schema_part, p.package_part, p.name_part, COUNT(e.id)
             FROM procedures p
             LEFT JOIN edges e ON e.target_kind = 'procedure' AND e.target_id = p.id
             GROUP BY p.id
             ORDER BY p.qualified",
        )?;

        let catalog = stmt
            .query_map([], |row| {
                Ok(ProcedureUsage {
                    procedure: row_to_procedure(row)?,
                    call_count: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(catalog)
    }
}
