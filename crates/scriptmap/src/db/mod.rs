//! `SQLite` storage layer for the scriptmap index.
//!
//! This module manages the `SQLite` database that stores scripts, control
//! files, procedures, and reference edges. `SQLite` is the source of truth
//! for all persistent data; the `query` module builds read views on top.
//!
//! ## Module Structure
//!
//! - `schema` - Database schema (DDL) and schema version
//! - `helpers` - Row conversion and parsing utilities
//! - `scripts` - Script CRUD operations
//! - `control_files` - Control-file CRUD operations
//! - `procedures` - Procedure CRUD and search operations
//! - `edges` - Edge replacement and adjacency queries
//!
//! ## Transaction model
//!
//! One analyzer run is bracketed by [`Store::begin_scan`] /
//! [`Store::commit_scan`] as a single `IMMEDIATE` transaction, so a reader
//! observes either the pre-scan or post-scan state. Edge replacement for a
//! single script additionally runs in a savepoint.

mod control_files;
mod edges;
mod helpers;
mod procedures;
mod schema;
mod scripts;

pub(crate) use helpers::{
    row_to_control_file, row_to_edge, row_to_procedure, row_to_script, CONTROL_FILES_COLUMNS,
    EDGES_COLUMNS, PROCEDURES_COLUMNS, SCRIPTS_COLUMNS,
};
pub(crate) use schema::{SCHEMA, SCHEMA_VERSION};

pub use edges::NewEdge;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Summary, TargetKind};

/// Attempts made to open the scan transaction before giving up.
const BUSY_RETRIES: u32 = 3;

/// Initial backoff between busy retries; doubled on each attempt.
const BUSY_BACKOFF: Duration = Duration::from_millis(50);

/// `SQLite` database wrapper for the scriptmap index.
///
/// The connection is wrapped in a `Mutex` so the handle can be shared between
/// the single writer and concurrent readers while maintaining thread safety.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the index database.
    ///
    /// Applies the schema idempotently and validates the recorded schema
    /// version; a store written by a newer scriptmap fails with
    /// [`Error::StoreIncompatible`].
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode and foreign keys
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Apply schema
        conn.execute_batch(SCHEMA)?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.check_schema_version()?;
        Ok(store)
    }

    /// Acquire the connection lock.
    ///
    /// Returns a `MutexGuard` providing exclusive access to the underlying
    /// connection. Used internally by all database operations.
    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Internal(format!(
                "store connection mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }

    /// Validate the schema version recorded in the `meta` table.
    ///
    /// A fresh store gets the current version written; an older store is
    /// stamped forward (the DDL is additive and idempotent); a newer store is
    /// refused.
    fn check_schema_version(&self) -> Result<()> {
        let conn = self.connection()?;

        let recorded: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match recorded.as_deref().map(str::parse::<i64>) {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                    [SCHEMA_VERSION.to_string()],
                )?;
                Ok(())
            }
            Some(Ok(found)) if found > SCHEMA_VERSION => Err(Error::StoreIncompatible {
                found,
                supported: SCHEMA_VERSION,
            }),
            Some(Ok(found)) => {
                if found < SCHEMA_VERSION {
                    debug!(found, current = SCHEMA_VERSION, "Stamping schema forward");
                    conn.execute(
                        "UPDATE meta SET value = ?1 WHERE key = 'schema_version'",
                        [SCHEMA_VERSION.to_string()],
                    )?;
                }
                Ok(())
            }
            Some(Err(_)) => Err(Error::Internal(format!(
                "unreadable schema_version in meta table: {recorded:?}"
            ))),
        }
    }

    /// Begin the scan transaction.
    ///
    /// Retries up to three times with exponential backoff when another
    /// process holds the write lock, then surfaces the store error.
    pub fn begin_scan(&self) -> Result<()> {
        let conn = self.connection()?;

        let mut backoff = BUSY_BACKOFF;
        for attempt in 1..=BUSY_RETRIES {
            match conn.execute_batch("BEGIN IMMEDIATE") {
                Ok(()) => return Ok(()),
                Err(e) if attempt < BUSY_RETRIES && is_busy(&e) => {
                    warn!(attempt, backoff_ms = backoff.as_millis() as u64, "Store busy, retrying");
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
                Err(e) => return Err(e.into()),
            }
        }
        unreachable!("loop returns on the final attempt")
    }

    /// Commit the scan transaction.
    pub fn commit_scan(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Roll back the scan transaction, restoring the pre-scan state.
    pub fn abort_scan(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Corpus-wide summary counts.
    pub fn summary(&self) -> Result<Summary> {
        let conn = self.connection()?;

        let script_count: usize =
            conn.query_row("SELECT COUNT(*) FROM scripts", [], |row| row.get(0))?;
        let control_file_count: usize =
            conn.query_row("SELECT COUNT(*) FROM control_files", [], |row| row.get(0))?;
        let procedure_count: usize =
            conn.query_row("SELECT COUNT(*) FROM procedures", [], |row| row.get(0))?;

        let mut stmt =
            conn.prepare("SELECT target_kind, COUNT(*) FROM edges GROUP BY target_kind")?;
        let rows = stmt.query_map([], |row| {
            let kind_str: String = row.get(0)?;
            let count: usize = row.get(1)?;
            Ok((kind_str, count))
        })?;

        let mut edge_count_by_kind: BTreeMap<TargetKind, usize> = BTreeMap::new();
        for row in rows {
            let (kind_str, count) = row?;
            match TargetKind::parse(&kind_str) {
                Some(kind) => {
                    edge_count_by_kind.insert(kind, count);
                }
                None => {
                    warn!(
                        kind = %kind_str,
                        count,
                        "Unknown target kind in store, skipping from summary"
                    );
                }
            }
        }

        Ok(Summary {
            script_count,
            control_file_count,
            procedure_count,
            edge_count_by_kind,
        })
    }

    /// Clear all indexed data (the `meta` table survives).
    pub fn clear(&self) -> Result<()> {
        let conn = self.connection()?;

        conn.execute_batch(
            "DELETE FROM edge_candidates; DELETE FROM inactive_refs; DELETE FROM edges; \
             DELETE FROM procedures; DELETE FROM control_files; DELETE FROM scripts;",
        )?;
        Ok(())
    }
}

/// True for the transient locked/busy errors worth retrying.
fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::DatabaseBusy
                || inner.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn temp_db() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("should create temp directory");
        let path = dir.path().join("test.db");
        (dir, path)
    }

    #[test]
    fn open_creates_database_and_schema() {
        let (_dir, path) = temp_db();

        let store = Store::open(&path).expect("failed to open store");
        let conn = store.connection().expect("should get connection");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"scripts".to_string()));
        assert!(tables.contains(&"control_files".to_string()));
        assert!(tables.contains(&"procedures".to_string()));
        assert!(tables.contains(&"edges".to_string()));
        assert!(tables.contains(&"edge_candidates".to_string()));
        assert!(tables.contains(&"inactive_refs".to_string()));
        assert!(tables.contains(&"meta".to_string()));
    }

    #[test]
    fn open_records_schema_version() {
        let (_dir, path) = temp_db();

        let store = Store::open(&path).unwrap();
        let conn = store.connection().unwrap();

        let version: String = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());
    }

    #[test]
    fn open_is_idempotent() {
        let (_dir, path) = temp_db();

        drop(Store::open(&path).unwrap());
        let store = Store::open(&path).expect("second open should succeed");
        assert!(store.summary().unwrap().script_count == 0);
    }

    #[test]
    fn open_refuses_newer_schema() {
        let (_dir, path) = temp_db();

        {
            let store = Store::open(&path).unwrap();
            let conn = store.connection().unwrap();
            conn.execute(
                "UPDATE meta SET value = ?1 WHERE key = 'schema_version'",
                [(SCHEMA_VERSION + 5).to_string()],
            )
            .unwrap();
        }

        let err = Store::open(&path).expect_err("newer schema must be refused");
        match err {
            Error::StoreIncompatible { found, supported } => {
                assert_eq!(found, SCHEMA_VERSION + 5);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            other => panic!("expected StoreIncompatible, got {other:?}"),
        }
    }

    #[test]
    fn abort_scan_discards_writes() {
        let (_dir, path) = temp_db();
        let store = Store::open(&path).unwrap();

        store.begin_scan().unwrap();
        store
            .upsert_script(Path::new("/jobs/a.ksh"), "a.ksh", crate::types::Language::Ksh, 10, 1, 1, 100)
            .unwrap();
        store.abort_scan().unwrap();

        assert_eq!(store.summary().unwrap().script_count, 0);
    }

    #[test]
    fn commit_scan_persists_writes() {
        let (_dir, path) = temp_db();
        let store = Store::open(&path).unwrap();

        store.begin_scan().unwrap();
        store
            .upsert_script(Path::new("/jobs/a.ksh"), "a.ksh", crate::types::Language::Ksh, 10, 1, 1, 100)
            .unwrap();
        store.commit_scan().unwrap();

        assert_eq!(store.summary().unwrap().script_count, 1);
    }
}
