//! Helper functions for database row conversion and parsing.
//!
//! These utilities convert between database representations and domain types.
//! Also provides SQL column list constants to reduce duplication across query
//! modules.

use std::path::PathBuf;

use crate::types::{
    ControlFile, ControlFileId, Edge, EdgeId, InvocationStyle, Language, Procedure, ProcedureId,
    ResolutionStatus, Script, ScriptId, TargetKind,
};

/// SQL column list for the scripts table.
///
/// Use with `row_to_script` for consistent column ordering.
pub(crate) const SCRIPTS_COLUMNS: &str =
    "id, path, basename, language, size_bytes, mtime_ns, line_count, stale";

/// SQL column list for the control_files table.
///
/// Use with `row_to_control_file` for consistent column ordering.
pub(crate) const CONTROL_FILES_COLUMNS: &str = "id, path, basename, size_bytes, stale";

/// SQL column list for the procedures table.
///
/// Use with `row_to_procedure` for consistent column ordering.
pub(crate) const PROCEDURES_COLUMNS: &str = "id, qualified, schema_part, package_part, name_part";

/// SQL column list for the edges table.
///
/// Use with `row_to_edge` for consistent column ordering.
pub(crate) const EDGES_COLUMNS: &str = "id, source_id, target_kind, target_id, target_name, \
     written_path, line, style, status, raw_text";

fn corrupt(what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("Unknown {what} '{value}' in store. Store may be corrupted or from a newer version.")
            .into(),
    )
}

/// Parse a language string from the database.
pub(crate) fn parse_language(s: &str) -> rusqlite::Result<Language> {
    Language::parse(s).ok_or_else(|| corrupt("language", s))
}

/// Parse a target-kind string from the database.
pub(crate) fn parse_target_kind(s: &str) -> rusqlite::Result<TargetKind> {
    TargetKind::parse(s).ok_or_else(|| corrupt("target kind", s))
}

/// Parse an invocation-style string from the database.
pub(crate) fn parse_style(s: &str) -> rusqlite::Result<InvocationStyle> {
    InvocationStyle::parse(s).ok_or_else(|| corrupt("invocation style", s))
}

/// Parse a resolution-status string from the database.
pub(crate) fn parse_status(s: &str) -> rusqlite::Result<ResolutionStatus> {
    ResolutionStatus::parse(s).ok_or_else(|| corrupt("resolution status", s))
}

/// Convert a database row to a [`Script`].
///
/// Expected columns: [`SCRIPTS_COLUMNS`].
pub(crate) fn row_to_script(row: &rusqlite::Row) -> rusqlite::Result<Script> {
    Ok(Script {
        id: ScriptId::from(row.get::<_, i64>(0)?),
        path: PathBuf::from(row.get::<_, String>(1)?),
        basename: row.get(2)?,
        language: parse_language(&row.get::<_, String>(3)?)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        mtime_ns: row.get(5)?,
        line_count: row.get(6)?,
        stale: row.get(7)?,
    })
}

/// Convert a database row to a [`ControlFile`].
///
/// Expected columns: [`CONTROL_FILES_COLUMNS`].
pub(crate) fn row_to_control_file(row: &rusqlite::Row) -> rusqlite::Result<ControlFile> {
    Ok(ControlFile {
        id: ControlFileId::from(row.get::<_, i64>(0)?),
        path: PathBuf::from(row.get::<_, String>(1)?),
        basename: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        stale: row.get(4)?,
    })
}

/// Convert a database row to a [`Procedure`].
///
/// Expected columns: [`PROCEDURES_COLUMNS`].
pub(crate) fn row_to_procedure(row: &rusqlite::Row) -> rusqlite::Result<Procedure> {
    Ok(Procedure {
        id: ProcedureId::from(row.get::<_, i64>(0)?),
        qualified: row.get(1)?,
        schema: row.get(2)?,
        package: row.get(3)?,
        name: row.get(4)?,
    })
}

/// Convert a database row to an [`Edge`].
///
/// Expected columns: [`EDGES_COLUMNS`].
pub(crate) fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
    Ok(Edge {
        id: EdgeId::from(row.get::<_, i64>(0)?),
        source_id: ScriptId::from(row.get::<_, i64>(1)?),
        target_kind: parse_target_kind(&row.get::<_, String>(2)?)?,
        target_id: row.get(3)?,
        target_name: row.get(4)?,
        written_path: row.get(5)?,
        line: row.get(6)?,
        style: parse_style(&row.get::<_, String>(7)?)?,
        status: parse_status(&row.get::<_, String>(8)?)?,
        raw_text: row.get(9)?,
    })
}
