//! Domain types for the scriptmap dependency index.
//!
//! These types represent the core domain model:
//! - **Entities**: `Script`, `ControlFile`, `Procedure`, `Edge` (stored in the database)
//! - **Transient**: raw references produced by the extractor (see `extract`)
//! - **Results**: `ScanReport`, `Summary` (query results)
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Target kind | Tagged enum, not strings | A reference targets exactly one of three entity kinds |
//! | Identity | Absolute path / qualified form | Matches the on-disk and in-database identity keys |
//! | Adjacency | Single edge table | Forward and backward views are queries, never duplicated state |
//! | Stale scripts | Flag, not delete | Historical edges stay queryable after a file disappears |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;

/// A strongly-typed script ID to prevent mixing with other entity IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptId(i64);

impl ScriptId {
    /// Extract the raw i64 value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ScriptId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A strongly-typed control-file ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlFileId(i64);

impl ControlFileId {
    /// Extract the raw i64 value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ControlFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ControlFileId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A strongly-typed procedure ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureId(i64);

impl ProcedureId {
    /// Extract the raw i64 value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProcedureId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Database primary key for a reference edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(i64);

impl EdgeId {
    /// Extract the raw i64 value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EdgeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Shell dialects recognized by the walker.
///
/// The tag is derived from the file extension only; scriptmap never inspects
/// the shebang to second-guess it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Korn shell scripts (`.ksh`)
    Ksh,
    /// Bourne/POSIX shell scripts (`.sh`)
    Sh,
}

impl Language {
    /// Detect language from a file extension.
    ///
    /// # Returns
    ///
    /// `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ksh" => Some(Self::Ksh),
            "sh" => Some(Self::Sh),
            _ => None,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ksh => "ksh",
            Self::Sh => "sh",
        }
    }

    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ksh" => Some(Self::Ksh),
            "sh" => Some(Self::Sh),
            _ => None,
        }
    }
}

/// What kind of file the walker found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// A `.ksh` or `.sh` script
    Script(Language),
    /// A `.ctl` bulk-loader control file
    ControlFile,
}

/// The kind of entity a reference edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Another script in the corpus
    Script,
    /// A bulk-loader control file
    ControlFile,
    /// A stored procedure / packaged function
    Procedure,
}

impl TargetKind {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::ControlFile => "control_file",
            Self::Procedure => "procedure",
        }
    }

    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "script" => Some(Self::Script),
            "control_file" => Some(Self::ControlFile),
            "procedure" => Some(Self::Procedure),
            _ => None,
        }
    }
}

/// How a reference was written at its call site.
///
/// The script-invocation styles mirror the syntaxes the extractor recognizes;
/// control-file and procedure references carry their own style tag so that
/// every edge has exactly one, keeping `(source, target, line, style)` a real
/// uniqueness key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStyle {
    /// `. ./env.ksh` or `source env.ksh`
    Sourced,
    /// A path token containing a directory separator, e.g. `./run.ksh`
    DirectPath,
    /// A bare `name.ksh` at command position
    BareName,
    /// `ksh run.ksh`, `bash run.sh`, `sh run.sh`
    Interpreter,
    /// Any script invocation with a trailing `&`
    Background,
    /// `control=name.ctl` on a bulk-loader command line
    ControlOption,
    /// `select pkg.proc(...) from dual`
    ProcedureCall,
}

impl InvocationStyle {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sourced => "sourced",
            Self::DirectPath => "direct_path",
            Self::BareName => "bare_name",
            Self::Interpreter => "interpreter",
            Self::Background => "background",
            Self::ControlOption => "control_option",
            Self::ProcedureCall => "procedure_call",
        }
    }

    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sourced" => Some(Self::Sourced),
            "direct_path" => Some(Self::DirectPath),
            "bare_name" => Some(Self::BareName),
            "interpreter" => Some(Self::Interpreter),
            "background" => Some(Self::Background),
            "control_option" => Some(Self::ControlOption),
            "procedure_call" => Some(Self::ProcedureCall),
            _ => None,
        }
    }
}

/// Outcome of resolving a referenced name against the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Exactly one matching target exists in the corpus
    Resolved,
    /// No matching target exists in the corpus
    Unresolved,
    /// Multiple targets share the referenced basename; candidates are recorded
    Ambiguous,
}

impl ResolutionStatus {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
            Self::Ambiguous => "ambiguous",
        }
    }

    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resolved" => Some(Self::Resolved),
            "unresolved" => Some(Self::Unresolved),
            "ambiguous" => Some(Self::Ambiguous),
            _ => None,
        }
    }
}

/// A discovered shell script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Database primary key
    pub id: ScriptId,
    /// Absolute path (identity key)
    pub path: PathBuf,
    /// File name without directory components
    pub basename: String,
    /// Shell dialect, by extension
    pub language: Language,
    /// File size in bytes
    pub size_bytes: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime_ns: i64,
    /// Number of lines at scan time
    pub line_count: u32,
    /// True when the file was absent from the most recent scan
    pub stale: bool,
}

/// A discovered bulk-loader control file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFile {
    /// Database primary key
    pub id: ControlFileId,
    /// Absolute path (identity key)
    pub path: PathBuf,
    /// File name without directory components
    pub basename: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// True when the file was absent from the most recent scan
    pub stale: bool,
}

/// A stored procedure referenced from at least one script.
///
/// The qualified textual form is the identity key; two call sites with
/// identical qualified text share one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    /// Database primary key
    pub id: ProcedureId,
    /// Qualified form as written, case preserved (e.g. `CRM_EXTRACT.get_customer_data`)
    pub qualified: String,
    /// Schema component, when three parts were written
    pub schema: Option<String>,
    /// Package component, when two or three parts were written
    pub package: Option<String>,
    /// Procedure/function name (always present)
    pub name: String,
}

impl Procedure {
    /// The lowercased qualified form used for substring search.
    #[must_use]
    pub fn qualified_lower(&self) -> String {
        self.qualified.to_lowercase()
    }
}

/// A directed reference from a script to a script, control file, or procedure.
///
/// Edges are immutable once written; re-scanning a script replaces its entire
/// outbound set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Database primary key
    pub id: EdgeId,
    /// The referring script
    pub source_id: ScriptId,
    /// What kind of entity the reference targets
    pub target_kind: TargetKind,
    /// Row id of the target entity (`None` while unresolved or ambiguous)
    pub target_id: Option<i64>,
    /// Display identity of the target: basename for files, qualified form for procedures
    pub target_name: String,
    /// The path as written at the call site, for diagnostics
    pub written_path: Option<String>,
    /// 1-indexed line number of the call site
    pub line: u32,
    /// Syntax of the call site
    pub style: InvocationStyle,
    /// Outcome of corpus resolution
    pub status: ResolutionStatus,
    /// The call-site text, trimmed
    pub raw_text: String,
}

/// A commented-out reference, retained for the debug surface only.
///
/// Inactive references are not edges: they carry no resolution status and
/// never appear in forward, backward, or search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveReference {
    /// The referring script
    pub source_id: ScriptId,
    /// What the commented text would have targeted
    pub target_kind: TargetKind,
    /// Basename or qualified form as written
    pub target_name: String,
    /// 1-indexed line number
    pub line: u32,
    /// The commented line, trimmed
    pub raw_text: String,
}

/// One row of a forward-dependency query.
#[derive(Debug, Clone)]
pub struct ForwardDependency {
    /// What kind of entity is referenced
    pub target_kind: TargetKind,
    /// Basename (files) or qualified form (procedures)
    pub target_name: String,
    /// Call-site line in the source script
    pub line: u32,
    /// Call-site syntax
    pub style: InvocationStyle,
    /// Resolution outcome
    pub status: ResolutionStatus,
    /// Paths of all candidate targets when the reference is ambiguous
    pub candidates: Vec<PathBuf>,
}

/// One row of a backward-dependency query.
#[derive(Debug, Clone)]
pub struct BackwardDependency {
    /// Path of the referring script
    pub source_path: PathBuf,
    /// Call-site line in the referring script
    pub line: u32,
    /// Call-site syntax
    pub style: InvocationStyle,
}

/// One row of a procedure search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureHit {
    /// Qualified form, case preserved
    pub qualified: String,
    /// Path of the calling script
    pub source_path: PathBuf,
    /// Call-site line
    pub line: u32,
}

/// One row of the procedure catalog.
#[derive(Debug, Clone)]
pub struct ProcedureUsage {
    /// The procedure
    pub procedure: Procedure,
    /// Number of call sites across the corpus
    pub call_count: usize,
}

/// Corpus-wide summary counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Number of indexed scripts (including stale ones)
    pub script_count: usize,
    /// Number of indexed control files
    pub control_file_count: usize,
    /// Number of distinct procedures
    pub procedure_count: usize,
    /// Edge counts keyed by target kind
    pub edge_count_by_kind: BTreeMap<TargetKind, usize>,
}

impl Summary {
    /// Total edge count across all target kinds.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count_by_kind.values().sum()
    }
}

/// Maximum number of sample paths reported per warning kind.
pub const WARNING_SAMPLE_LIMIT: usize = 10;

/// Statistics and warnings from a full scan.
///
/// Returned by [`Analyzer::analyze`](crate::Analyzer::analyze).
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Scripts parsed and re-indexed in this scan
    pub scripts_scanned: usize,
    /// Scripts skipped because path, size, and mtime were unchanged
    pub scripts_cached: usize,
    /// Control files discovered under the control-file root
    pub control_files_found: usize,
    /// Edges written in this scan (cache hits keep their prior edges)
    pub edges_written: usize,
    /// Scripts marked stale because they vanished from the filesystem
    pub scripts_marked_stale: usize,
    /// Per-file warnings accumulated during the scan
    pub warnings: Vec<ScanWarning>,
    /// How long the scan took
    pub duration: Duration,
}

impl ScanReport {
    /// Count warnings of a given kind.
    #[must_use]
    pub fn warning_count(&self, kind: crate::error::ScanWarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Up to [`WARNING_SAMPLE_LIMIT`] offending paths for a given warning kind.
    #[must_use]
    pub fn sample_paths(&self, kind: crate::error::ScanWarningKind) -> Vec<&std::path::Path> {
        self.warnings
            .iter()
            .filter(|w| w.kind == kind)
            .take(WARNING_SAMPLE_LIMIT)
            .map(|w| w.path.as_path())
            .collect()
    }
}
