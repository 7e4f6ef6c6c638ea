//! Edge replacement and adjacency queries for the scriptmap index.
//!
//! Edges are immutable once written: re-scanning a script replaces its whole
//! outbound set atomically. Forward and backward adjacency are both read
//! from the single `edges` table.

use rusqlite::params;

use super::{row_to_edge, Store, EDGES_COLUMNS};
use crate::error::Result;
use crate::types::{
    Edge, InactiveReference, InvocationStyle, ResolutionStatus, ScriptId, TargetKind,
};

/// Data required to insert one edge.
///
/// This is the write-side shape used by [`Store::replace_edges_of`]; the
/// read-side counterpart is [`Edge`].
#[derive(Debug, Clone)]
pub struct NewEdge {
    pub target_kind: TargetKind,
    pub target_id: Option<i64>,
    pub target_name: String,
    pub written_path: Option<String>,
    pub line: u32,
    pub style: InvocationStyle,
    pub status: ResolutionStatus,
    pub raw_text: String,
    /// Candidate target row ids when the reference is ambiguous
    pub candidates: Vec<i64>,
}

impl Store {
    /// Replace the outbound edges of a script with the supplied set.
    ///
    /// Runs in a savepoint: either the old edges are fully replaced or
    /// nothing changes. A duplicate `(source, target, line, style)` within
    /// the supplied set collapses to one edge. Returns the number of edges
    /// written.
    pub fn replace_edges_of(&self, script_id: ScriptId, edges: &[NewEdge]) -> Result<usize> {
        let conn = self.connection()?;
        conn.execute_batch("SAVEPOINT replace_edges")?;

        let result = (|| -> Result<usize> {
            conn.execute("DELETE FROM edges WHERE source_id = ?1", [script_id.as_i64()])?;

            let mut written = 0;
            for edge in edges {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO edges
                     (source_id, target_kind, target_id, target_name, written_path,
                      line, style, status, raw_text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        script_id.as_i64(),
                        edge.target_kind.as_str(),
                        edge.target_id,
                        edge.target_name,
                        edge.written_path,
                        edge.line,
                        edge.style.as_str(),
                        edge.status.as_str(),
                        edge.raw_text
                    ],
                )?;
                if inserted == 0 {
                    continue;
                }
                written += 1;

                let edge_id = conn.last_insert_rowid();
                for candidate in &edge.candidates {
                    conn.execute(
                        "INSERT OR IGNORE INTO edge_candidates (edge_id, candidate_id) VALUES (?1, ?2)",
                        params![edge_id, candidate],
                    )?;
                }
            }
            Ok(written)
        })();

        match result {
            Ok(written) => {
                conn.execute_batch("RELEASE replace_edges")?;
                Ok(written)
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK TO replace_edges; RELEASE replace_edges")?;
                Err(e)
            }
        }
    }

    /// All outbound edges of a script, ordered by (line, style).
    pub fn outbound(&self, script_id: ScriptId) -> Result<Vec<Edge>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGES_COLUMNS} FROM edges WHERE source_id = ?1 ORDER BY line, style"
        ))?;

        let edges = stmt
            .query_map([script_id.as_i64()], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    /// All inbound edges of a target entity, ordered by source path then line.
    pub fn inbound(&self, target_id: i64, kind: TargetKind) -> Result<Vec<Edge>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {cols} FROM edges e
             JOIN scripts s ON s.id = e.source_id
             WHERE e.target_id = ?1 AND e.target_kind = ?2
             ORDER BY s.path, e.line",
            cols = edges_columns_qualified()
        ))?;

        let edges = stmt
            .query_map(params![target_id, kind.as_str()], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    /// Candidate target row ids of an ambiguous edge, in insertion order.
    pub fn edge_candidates(&self, edge_id: i64) -> Result<Vec<i64>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT candidate_id FROM edge_candidates WHERE edge_id = ?1 ORDER BY candidate_id",
        )?;

        let ids = stmt
            .query_map([edge_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    /// Replace the recorded inactive (commented-out) references of a script.
    pub fn replace_inactive_refs_of(
        &self,
        script_id: ScriptId,
        refs: &[(TargetKind, String, u32, String)],
    ) -> Result<()> {
        let conn = self.connection()?;

        conn.execute(
            "DELETE FROM inactive_refs WHERE source_id = ?1",
            [script_id.as_i64()],
        )?;
        for (kind, name, line, raw) in refs {
            conn.execute(
                "INSERT INTO inactive_refs (source_id, target_kind, target_name, line, raw_text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![script_id.as_i64(), kind.as_str(), name, line, raw],
            )?;
        }
        Ok(())
    }

    /// Commented-out references of a script, ordered by line (debug surface).
    pub fn inactive_refs_of(&self, script_id: ScriptId) -> Result<Vec<InactiveReference>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT source_id, target_kind, target_name, line, raw_text
             FROM inactive_refs WHERE source_id = ?1 ORDER BY line",
        )?;

        let refs = stmt
            .query_map([script_id.as_i64()], |row| {
                Ok(InactiveReference {
                    source_id: ScriptId::from(row.get::<_, i64>(0)?),
                    target_kind: super::helpers::parse_target_kind(&row.get::<_, String>(1)?)?,
                    target_name: row.get(2)?,
                    line: row.get(3)?,
                    raw_text: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(refs)
    }

    /// Downgrade edges whose resolved target was pruned from the store.
    ///
    /// A pruning scan deletes vanished scripts and control files; edges from
    /// surviving (cache-hit) scripts may still point at them. Those edges
    /// become unresolved so that "every resolved reference's target exists"
    /// keeps holding. Returns the number of edges downgraded.
    pub fn downgrade_dangling_edges(&self) -> Result<usize> {
        let conn = self.connection()?;

        let scripts = conn.execute(
            "UPDATE edges SET target_id = NULL, status = 'unresolved'
             WHERE target_kind = 'script' AND target_id IS NOT NULL
               AND target_id NOT IN (SELECT id FROM scripts)",
            [],
        )?;
        let ctls = conn.execute(
            "UPDATE edges SET target_id = NULL, status = 'unresolved'
             WHERE target_kind = 'control_file' AND target_id IS NOT NULL
               AND target_id NOT IN (SELECT id FROM control_files)",
            [],
        )?;
        Ok(scripts + ctls)
    }

    /// All edges in the store, ordered by (source path, line, style, target).
    ///
    /// Used by the exporter; the ordering makes export output stable.
    pub fn list_all_edges(&self) -> Result<Vec<Edge>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {cols} FROM edges e
             JOIN scripts s ON s.id = e.source_id
             ORDER BY s.path, e.line, e.style, e.target_kind, e.target_name",
            cols = edges_columns_qualified()
        ))?;

        let edges = stmt
            .query_map([], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(edges)
    }
}

/// [`EDGES_COLUMNS`] qualified with the `e.` alias for joined queries.
fn edges_columns_qualified() -> String {
    EDGES_COLUMNS
        .split(", ")
        .map(|c| format!("e.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
