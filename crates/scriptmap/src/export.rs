//! Portable JSON serialization of the indexed graph.
//!
//! One document with four top-level keys: `scripts`, `control_files`,
//! `procedures`, `edges`. Every array is sorted by identity, so exports of
//! an unchanged corpus are byte-identical across runs and diff cleanly
//! under review.

use std::io::Write;

use serde::Serialize;

use crate::db::Store;
use crate::error::{Error, Result};
use crate::types::{InvocationStyle, ResolutionStatus, TargetKind};

/// The complete export document.
#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub scripts: Vec<ScriptRecord>,
    pub control_files: Vec<ControlFileRecord>,
    pub procedures: Vec<ProcedureRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// One script, keyed by path.
#[derive(Debug, Serialize)]
pub struct ScriptRecord {
    pub path: String,
    pub basename: String,
    pub language: String,
    pub size_bytes: u64,
    pub mtime_ns: i64,
    pub line_count: u32,
    pub stale: bool,
}

/// One control file, keyed by path.
#[derive(Debug, Serialize)]
pub struct ControlFileRecord {
    pub path: String,
    pub basename: String,
    pub size_bytes: u64,
    pub stale: bool,
}

/// One procedure, keyed by qualified form.
#[derive(Debug, Serialize)]
pub struct ProcedureRecord {
    pub qualified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub name: String,
}

/// One reference edge.
#[derive(Debug, Serialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target_kind: TargetKind,
    pub target: String,
    pub line: u32,
    pub style: InvocationStyle,
    pub status: ResolutionStatus,
}

/// Assemble the export document from the store.
pub fn build_document(store: &Store) -> Result<ExportDocument> {
    let scripts = store
        .list_all_scripts()?
        .into_iter()
        .map(|s| ScriptRecord {
            path: s.path.to_string_lossy().into_owned(),
            basename: s.basename,
            language: s.language.as_str().to_string(),
            size_bytes: s.size_bytes,
            mtime_ns: s.mtime_ns,
            line_count: s.line_count,
            stale: s.stale,
        })
        .collect();

    let control_files = store
        .list_all_control_files()?
        .into_iter()
        .map(|c| ControlFileRecord {
            path: c.path.to_string_lossy().into_owned(),
            basename: c.basename,
            size_bytes: c.size_bytes,
            stale: c.stale,
        })
        .collect();

    let procedures = store
        .list_all_procedures()?
        .into_iter()
        .map(|p| ProcedureRecord {
            qualified: p.qualified,
            schema: p.schema,
            package: p.package,
            name: p.name,
        })
        .collect();

    let mut edges = Vec::new();
    for edge in store.list_all_edges()? {
        let source = store
            .get_script_by_id(edge.source_id)?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "edge {} references missing source script {}",
                    edge.id, edge.source_id
                ))
            })?;
        edges.push(EdgeRecord {
            source: source.path.to_string_lossy().into_owned(),
            target_kind: edge.target_kind,
            target: edge.target_name,
            line: edge.line,
            style: edge.style,
            status: edge.status,
        });
    }

    Ok(ExportDocument {
        scripts,
        control_files,
        procedures,
        edges,
    })
}

/// Serialize the graph to `writer` as pretty-printed JSON.
pub fn write_export<W: Write>(store: &Store, writer: &mut W) -> Result<()> {
    let document = build_document(store)?;
    serde_json::to_writer_pretty(&mut *writer, &document)
        .map_err(|e| Error::Internal(format!("export serialization failed: {e}")))?;
    writer.write_all(b"\n")?;
    Ok(())
}
