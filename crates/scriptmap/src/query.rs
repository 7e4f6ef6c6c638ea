//! Read-side queries over the indexed graph.
//!
//! All results are snapshots assembled from the store at call time; nothing
//! here holds state beyond the call. Forward and backward views are computed
//! from the single edge table.

use crate::db::Store;
use crate::error::Result;
use crate::types::{
    BackwardDependency, ForwardDependency, ProcedureHit, ResolutionStatus, ScriptId, TargetKind,
};

/// Upper bound applied to un-paginated procedure searches.
///
/// Interactive callers pass a needle and read the whole result; this cap
/// guards against a one-letter needle materializing the entire call table.
const SEARCH_LIMIT: usize = 10_000;

/// Outbound references of one script, ordered by (line, style).
///
/// Ambiguous references carry the paths of all candidate targets.
pub fn forward_dependencies(store: &Store, script_id: ScriptId) -> Result<Vec<ForwardDependency>> {
    let edges = store.outbound(script_id)?;
    let mut result = Vec::with_capacity(edges.len());

    for edge in edges {
        let candidates = if edge.status == ResolutionStatus::Ambiguous {
            let ids = store.edge_candidates(edge.id.as_i64())?;
            let mut paths = Vec::with_capacity(ids.len());
            for id in ids {
                let path = match edge.target_kind {
                    TargetKind::Script => store
                        .get_script_by_id(crate::types::ScriptId::from(id))?
                        .map(|s| s.path),
                    TargetKind::ControlFile => store
                        .get_control_file_by_id(crate::types::ControlFileId::from(id))?
                        .map(|c| c.path),
                    TargetKind::Procedure => None,
                };
                if let Some(path) = path {
                    paths.push(path);
                }
            }
            paths.sort();
            paths
        } else {
            Vec::new()
        };

        result.push(ForwardDependency {
            target_kind: edge.target_kind,
            target_name: edge.target_name,
            line: edge.line,
            style: edge.style,
            status: edge.status,
            candidates,
        });
    }

    Ok(result)
}

/// Referring scripts of a target entity.
///
/// Deduplicated by source script (the first call site by line wins) and
/// ordered by source path.
pub fn backward_dependencies(
    store: &Store,
    target_id: i64,
    kind: TargetKind,
) -> Result<Vec<BackwardDependency>> {
    let edges = store.inbound(target_id, kind)?;
    let mut result: Vec<BackwardDependency> = Vec::new();
    let mut last_source = None;

    // inbound() is ordered by (source path, line), so the first edge per
    // source is its lowest call site
    for edge in edges {
        if last_source == Some(edge.source_id) {
            continue;
        }
        last_source = Some(edge.source_id);
        let source = store
            .get_script_by_id(edge.source_id)?
            .ok_or_else(|| {
                crate::error::Error::Internal(format!(
                    "edge {} references missing source script {}",
                    edge.id, edge.source_id
                ))
            })?;
        result.push(BackwardDependency {
            source_path: source.path,
            line: edge.line,
            style: edge.style,
        });
    }

    Ok(result)
}

/// Case-insensitive substring search over qualified procedure forms.
///
/// The needle is trimmed; an empty needle returns an empty result. Results
/// are ordered by (procedure, source path, line).
pub fn search_procedures(store: &Store, needle: &str) -> Result<Vec<ProcedureHit>> {
    store.search_procedures(needle, SEARCH_LIMIT, 0)
}
