//! Database schema definition for the scriptmap index.

/// Schema version understood by this build.
///
/// Recorded in the `meta` table; opening a store with a higher version fails
/// with `Error::StoreIncompatible`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- Store metadata (schema version, etc.)
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Discovered shell scripts
CREATE TABLE IF NOT EXISTS scripts (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    basename TEXT NOT NULL,
    language TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    mtime_ns INTEGER NOT NULL,
    line_count INTEGER NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    scanned_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scripts_basename ON scripts(basename);

-- Discovered bulk-loader control files
CREATE TABLE IF NOT EXISTS control_files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    basename TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    scanned_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_control_files_basename ON control_files(basename);

-- Stored procedures, one row per distinct qualified form
CREATE TABLE IF NOT EXISTS procedures (
    id INTEGER PRIMARY KEY,
    qualified TEXT NOT NULL UNIQUE,
    qualified_lower TEXT NOT NULL,
    schema_part TEXT,
    package_part TEXT,
    name_part TEXT NOT NULL,
    schema_lower TEXT,
    package_lower TEXT,
    name_lower TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_procedures_qualified_lower ON procedures(qualified_lower);
CREATE INDEX IF NOT EXISTS idx_procedures_schema_lower ON procedures(schema_lower);
CREATE INDEX IF NOT EXISTS idx_procedures_package_lower ON procedures(package_lower);
CREATE INDEX IF NOT EXISTS idx_procedures_name_lower ON procedures(name_lower);

-- Reference edges: script -> {script, control file, procedure}
-- target_id is NULL for unresolved and ambiguous references
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL REFERENCES scripts(id) ON DELETE CASCADE,
    target_kind TEXT NOT NULL,
    target_id INTEGER,
    target_name TEXT NOT NULL,
    written_path TEXT,
    line INTEGER NOT NULL,
    style TEXT NOT NULL,
    status TEXT NOT NULL,
    raw_text TEXT NOT NULL,
    UNIQUE (source_id, target_kind, target_name, line, style)
);

CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id, target_kind);

-- Candidate targets of ambiguous edges
CREATE TABLE IF NOT EXISTS edge_candidates (
    edge_id INTEGER NOT NULL REFERENCES edges(id) ON DELETE CASCADE,
    candidate_id INTEGER NOT NULL,
    PRIMARY KEY (edge_id, candidate_id)
);

-- Commented-out references, kept for the debug surface only
CREATE TABLE IF NOT EXISTS inactive_refs (
    id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL REFERENCES scripts(id) ON DELETE CASCADE,
    target_kind TEXT NOT NULL,
    target_name TEXT NOT NULL,
    line INTEGER NOT NULL,
    raw_text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_inactive_source ON inactive_refs(source_id);
";
