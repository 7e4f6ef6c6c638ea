//! # scriptmap: Shell Script Dependency Index and Query Interface
//!
//! scriptmap statically analyzes estates of `.ksh`/`.sh` driver scripts that
//! mix shell orchestration with embedded database calls and bulk-loader
//! control files. It indexes three kinds of outbound references — script
//! invocations, `control=` file references, and `select ... from dual`
//! stored-procedure calls — in `SQLite`, and answers forward ("what does X
//! call?"), backward ("what calls X?"), and procedure-search queries over
//! the resulting graph.
//!
//! ## Design Philosophy
//!
//! - **Static, best-effort** - scripts are never executed; ambiguity is
//!   recorded on the edge, not resolved by guessing
//! - **Single writer, many readers** - parsing fans out across a worker
//!   pool; persistence funnels through one transactional writer
//! - **Facts, not judgments** - unresolved and ambiguous references are
//!   data the operator can query, never errors
//!
//! ## Quick Start
//!
//! ```no_run
//! use scriptmap::Analyzer;
//! use std::path::Path;
//!
//! let analyzer = Analyzer::new(Path::new("/srv/batch/scripts"), Path::new("/srv/batch/ctl"))?;
//! let report = analyzer.analyze()?;
//! println!("{} scripts, {} edges", report.scripts_scanned, report.edges_written);
//!
//! for hit in analyzer.search_procedures("customer")? {
//!     println!("{} called from {} line {}", hit.qualified, hit.source_path.display(), hit.line);
//! }
//! # Ok::<(), scriptmap::Error>(())
//! ```

mod db;
mod error;
mod export;
mod extract;
mod lexer;
mod parallel;
mod query;
mod resolver;
mod types;
mod walker;

pub use db::{NewEdge, Store};
pub use error::{Error, Result, ScanWarning, ScanWarningKind};
pub use export::{ControlFileRecord, EdgeRecord, ExportDocument, ProcedureRecord, ScriptRecord};
pub use types::{
    BackwardDependency, ControlFile, ControlFileId, Edge, EdgeId, ForwardDependency,
    InactiveReference, InvocationStyle, Language, Procedure, ProcedureHit, ProcedureId,
    ProcedureUsage, ResolutionStatus, ScanReport, Script, ScriptId, Summary, TargetKind,
};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use tracing::{debug, warn};

use extract::{InactiveRef, RawReference};
use parallel::ParsedScript;
use resolver::Resolution;
use types::FileKind;
use walker::WalkKinds;

/// Directory under the script root holding the persistent index.
const STORE_DIR: &str = ".scriptmap";

/// Index database filename.
const STORE_FILE: &str = "index.db";

/// Cooperative cancellation signal for a running scan.
///
/// Checked between files; a cancelled scan rolls back all uncommitted writes
/// and fails with [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for configuring a scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Delete (rather than mark stale) scripts and control files that have
    /// vanished from the filesystem since the previous scan.
    pub prune: bool,
}

/// Shell-script dependency index and query interface.
///
/// `Analyzer` is the main entry point. It owns the `SQLite` store handle and
/// exposes the scan operation plus the query surface consumed by CLI and
/// viewer front-ends.
#[derive(Debug)]
pub struct Analyzer {
    script_root: PathBuf,
    ctl_root: PathBuf,
    db_path: PathBuf,
    store: Store,
}

// In-memory corpus lookup built after registration, backing resolution.
struct CorpusMaps {
    script_by_path: HashMap<PathBuf, i64>,
    scripts_by_basename: HashMap<String, Vec<i64>>,
    ctls_by_basename: HashMap<String, Vec<i64>>,
}

#[allow(clippy::missing_errors_doc)]
impl Analyzer {
    /// Create an analyzer for a script tree and a control-file tree.
    ///
    /// The two roots may be the same directory. The index database lives at
    /// `<script_root>/.scriptmap/index.db`.
    pub fn new(script_root: &Path, ctl_root: &Path) -> Result<Self> {
        let db_path = script_root.join(STORE_DIR).join(STORE_FILE);
        Self::with_store_path(script_root, ctl_root, &db_path)
    }

    /// Create an analyzer with an explicit store location.
    pub fn with_store_path(script_root: &Path, ctl_root: &Path, db_path: &Path) -> Result<Self> {
        let script_root = script_root
            .canonicalize()
            .map_err(|_| Error::InputNotFound(script_root.to_path_buf()))?;
        let ctl_root = ctl_root
            .canonicalize()
            .map_err(|_| Error::InputNotFound(ctl_root.to_path_buf()))?;

        let store = Store::open(db_path)?;

        Ok(Self {
            script_root,
            ctl_root,
            db_path: db_path.to_path_buf(),
            store,
        })
    }

    /// Path to the `SQLite` database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The underlying store handle.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    // === Scanning ===

    /// Run a full scan with default options and no cancellation.
    pub fn analyze(&self) -> Result<ScanReport> {
        self.analyze_with(ScanOptions::default(), &CancelToken::new())
    }

    /// Run a full scan.
    ///
    /// Discovery and parsing happen before the store transaction opens;
    /// all writes are applied inside a single scan transaction, so a failure
    /// (or cancellation) leaves the prior indexed state intact.
    pub fn analyze_with(&self, options: ScanOptions, cancel: &CancelToken) -> Result<ScanReport> {
        let start = Instant::now();
        let scan_started_at = now_ns()?;
        let mut report = ScanReport::default();

        // Phase 0: discovery (read-only)
        let script_files = walker::walk(&self.script_root, WalkKinds::scripts(), &mut report.warnings)?;
        let ctl_files = walker::walk(&self.ctl_root, WalkKinds::control_files(), &mut report.warnings)?;
        report.control_files_found = ctl_files.len();

        // Split scripts into files needing a parse and unchanged cache hits.
        let mut to_parse: Vec<(PathBuf, Language)> = Vec::new();
        let mut cache_hits: Vec<Script> = Vec::new();
        for (path, kind) in &script_files {
            let FileKind::Script(language) = kind else {
                continue;
            };
            let metadata = match std::fs::metadata(path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot stat script, skipping");
                    report.warnings.push(ScanWarning::unreadable(path.clone(), &e));
                    continue;
                }
            };
            let mtime_ns = mtime_ns(path, &metadata);
            match self.store.get_script_by_path(path)? {
                Some(prior)
                    if prior.size_bytes == metadata.len() && prior.mtime_ns == mtime_ns =>
                {
                    cache_hits.push(prior);
                }
                _ => to_parse.push((path.clone(), *language)),
            }
        }

        // Phase 1: parallel parse (read-only, cancellation-aware)
        let parsed: Vec<ParsedScript> = to_parse
            .par_iter()
            .filter_map(|(path, language)| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(parse_script(path, *language))
            })
            .collect();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        for p in &parsed {
            report.warnings.extend(p.warnings.iter().cloned());
        }
        report.scripts_scanned = parsed.len();
        report.scripts_cached = cache_hits.len();

        // Phases 2-3: single-writer persistence inside the scan transaction
        self.store.begin_scan()?;
        let write_result = self.write_scan(
            scan_started_at,
            options,
            cancel,
            &ctl_files,
            &parsed,
            &cache_hits,
            &mut report,
        );
        match write_result {
            Ok(()) => self.store.commit_scan()?,
            Err(e) => {
                if let Err(rollback) = self.store.abort_scan() {
                    warn!(error = %rollback, "Rollback after failed scan also failed");
                }
                return Err(e);
            }
        }

        report.duration = start.elapsed();
        debug!(
            scanned = report.scripts_scanned,
            cached = report.scripts_cached,
            edges = report.edges_written,
            warnings = report.warnings.len(),
            "Scan complete"
        );
        Ok(report)
    }

    /// Apply all writes for one scan. Runs inside the scan transaction.
    #[allow(clippy::too_many_arguments)]
    fn write_scan(
        &self,
        scan_started_at: i64,
        options: ScanOptions,
        cancel: &CancelToken,
        ctl_files: &[(PathBuf, FileKind)],
        parsed: &[ParsedScript],
        cache_hits: &[Script],
        report: &mut ScanReport,
    ) -> Result<()> {
        // Register control files first so control references can resolve.
        let mut ctl_pairs: Vec<(PathBuf, i64)> = Vec::new();
        for (path, _) in ctl_files {
            let size = match std::fs::metadata(path) {
                Ok(m) => m.len(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot stat control file, skipping");
                    report.warnings.push(ScanWarning::unreadable(path.clone(), &e));
                    continue;
                }
            };
            let basename = basename_str(path);
            let id = self
                .store
                .upsert_control_file(path, &basename, size, scan_started_at)?;
            ctl_pairs.push((path.clone(), id.as_i64()));
        }

        // Register every script seen this scan.
        let mut script_pairs: Vec<(PathBuf, i64)> = Vec::new();
        for p in parsed {
            let id = self.store.upsert_script(
                &p.path,
                p.basename(),
                p.language,
                p.size_bytes,
                p.mtime_ns,
                p.line_count,
                scan_started_at,
            )?;
            script_pairs.push((p.path.clone(), id.as_i64()));
        }
        for s in cache_hits {
            let id = self.store.upsert_script(
                &s.path,
                &s.basename,
                s.language,
                s.size_bytes,
                s.mtime_ns,
                s.line_count,
                scan_started_at,
            )?;
            script_pairs.push((s.path.clone(), id.as_i64()));
        }

        let maps = build_corpus_maps(&script_pairs, &ctl_pairs);

        // Resolve and persist edges, one script at a time.
        for p in parsed {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let script_id = ScriptId::from(
                *maps
                    .script_by_path
                    .get(&p.path)
                    .ok_or_else(|| Error::Internal(format!("script vanished from corpus map: {}", p.path.display())))?,
            );
            let edges = self.build_edges(p, &maps)?;
            report.edges_written += self.store.replace_edges_of(script_id, &edges)?;

            let inactive: Vec<_> = p
                .inactive
                .iter()
                .map(|r: &InactiveRef| (r.target_kind, r.target_name.clone(), r.line, r.raw.clone()))
                .collect();
            self.store.replace_inactive_refs_of(script_id, &inactive)?;
        }

        // Stale lifecycle for files that vanished since the prior scan.
        if options.prune {
            let pruned = self.store.prune_unseen_scripts(scan_started_at)?
                + self.store.prune_unseen_control_files(scan_started_at)?;
            let downgraded = self.store.downgrade_dangling_edges()?;
            debug!(pruned, downgraded, "Pruned vanished files");
        } else {
            report.scripts_marked_stale = self.store.mark_unseen_scripts_stale(scan_started_at)?;
            self.store.mark_unseen_control_files_stale(scan_started_at)?;
        }

        Ok(())
    }

    /// Convert the raw references of one parsed script into edges.
    fn build_edges(&self, parsed: &ParsedScript, maps: &CorpusMaps) -> Result<Vec<NewEdge>> {
        let mut edges = Vec::with_capacity(parsed.references.len());

        for reference in &parsed.references {
            let edge = match reference {
                RawReference::Procedure(p) => {
                    let id = self.store.upsert_procedure(
                        &p.qualified,
                        p.schema.as_deref(),
                        p.package.as_deref(),
                        &p.name,
                    )?;
                    NewEdge {
                        target_kind: TargetKind::Procedure,
                        target_id: Some(id.as_i64()),
                        target_name: p.qualified.clone(),
                        written_path: None,
                        line: p.line,
                        style: InvocationStyle::ProcedureCall,
                        status: ResolutionStatus::Resolved,
                        raw_text: p.raw.clone(),
                        candidates: Vec::new(),
                    }
                }
                RawReference::ControlFile(c) => {
                    let resolution = resolver::resolve_by_basename(&c.basename, |b| {
                        maps.ctls_by_basename.get(b).cloned().unwrap_or_default()
                    });
                    new_file_edge(
                        TargetKind::ControlFile,
                        InvocationStyle::ControlOption,
                        &c.basename,
                        &c.written,
                        c.line,
                        &c.raw,
                        resolution,
                    )
                }
                RawReference::Script(s) => {
                    let resolution = resolver::resolve_script(
                        &s.written,
                        &s.basename,
                        parsed.dir(),
                        |p| maps.script_by_path.get(p).copied(),
                        |b| maps.scripts_by_basename.get(b).cloned().unwrap_or_default(),
                    );
                    new_file_edge(
                        TargetKind::Script,
                        s.style,
                        &s.basename,
                        &s.written,
                        s.line,
                        &s.raw,
                        resolution,
                    )
                }
            };
            edges.push(edge);
        }

        Ok(edges)
    }

    // === Queries ===

    /// Outbound references of one script, ordered by (line, style).
    pub fn forward_dependencies(&self, script_id: ScriptId) -> Result<Vec<ForwardDependency>> {
        query::forward_dependencies(&self.store, script_id)
    }

    /// Referring scripts of a target, deduplicated by source and ordered by
    /// source path.
    pub fn backward_dependencies(
        &self,
        target_id: i64,
        kind: TargetKind,
    ) -> Result<Vec<BackwardDependency>> {
        query::backward_dependencies(&self.store, target_id, kind)
    }

    /// Case-insensitive substring search over qualified procedure forms.
    pub fn search_procedures(&self, needle: &str) -> Result<Vec<ProcedureHit>> {
        query::search_procedures(&self.store, needle)
    }

    /// Corpus-wide summary counts.
    pub fn summary(&self) -> Result<Summary> {
        self.store.summary()
    }

    /// Distinct procedures with call-site counts, ordered by qualified form.
    pub fn procedure_catalog(&self) -> Result<Vec<ProcedureUsage>> {
        self.store.procedure_catalog()
    }

    /// Commented-out references of one script (debug surface).
    pub fn inactive_references(&self, script_id: ScriptId) -> Result<Vec<InactiveReference>> {
        self.store.inactive_refs_of(script_id)
    }

    /// All scripts matching a basename, ordered by path.
    pub fn scripts_named(&self, basename: &str) -> Result<Vec<Script>> {
        self.store.get_scripts_by_basename(basename)
    }

    /// Write the portable JSON serialization of the whole graph.
    pub fn export_to(&self, destination: &Path) -> Result<()> {
        let file = std::fs::File::create(destination)?;
        let mut writer = std::io::BufWriter::new(file);
        export::write_export(&self.store, &mut writer)
    }
}

/// Build the lookup maps backing reference resolution.
///
/// Candidate lists are ordered by path so ambiguous candidate sets are
/// deterministic for a given corpus.
fn build_corpus_maps(scripts: &[(PathBuf, i64)], ctls: &[(PathBuf, i64)]) -> CorpusMaps {
    let mut script_pairs = scripts.to_vec();
    script_pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let mut ctl_pairs = ctls.to_vec();
    ctl_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut script_by_path = HashMap::new();
    let mut scripts_by_basename: HashMap<String, Vec<i64>> = HashMap::new();
    for (path, id) in &script_pairs {
        script_by_path.insert(path.clone(), *id);
        scripts_by_basename
            .entry(basename_str(path))
            .or_default()
            .push(*id);
    }

    let mut ctls_by_basename: HashMap<String, Vec<i64>> = HashMap::new();
    for (path, id) in &ctl_pairs {
        ctls_by_basename
            .entry(basename_str(path))
            .or_default()
            .push(*id);
    }

    CorpusMaps {
        script_by_path,
        scripts_by_basename,
        ctls_by_basename,
    }
}

/// Build a file-target edge from a resolution outcome.
fn new_file_edge(
    target_kind: TargetKind,
    style: InvocationStyle,
    basename: &str,
    written: &str,
    line: u32,
    raw: &str,
    resolution: Resolution,
) -> NewEdge {
    let (target_id, status, candidates) = match resolution {
        Resolution::Resolved(id) => (Some(id), ResolutionStatus::Resolved, Vec::new()),
        Resolution::Unresolved => (None, ResolutionStatus::Unresolved, Vec::new()),
        Resolution::Ambiguous(candidates) => (None, ResolutionStatus::Ambiguous, candidates),
    };
    NewEdge {
        target_kind,
        target_id,
        target_name: basename.to_string(),
        written_path: Some(written.to_string()),
        line,
        style,
        status,
        raw_text: raw.to_string(),
        candidates,
    }
}

/// Read, lex, and extract one script. Pure with respect to the store.
fn parse_script(path: &Path, language: Language) -> ParsedScript {
    let mut warnings = Vec::new();

    let (content, size_bytes, mtime_ns) = match std::fs::read(path) {
        Ok(bytes) => {
            let size = bytes.len() as u64;
            let mtime = std::fs::metadata(path)
                .map(|m| self::mtime_ns(path, &m))
                .unwrap_or(0);
            let content = match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(e) => {
                    warnings.push(ScanWarning::invalid_encoding(path.to_path_buf()));
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            (content, size, mtime)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read script");
            warnings.push(ScanWarning::unreadable(path.to_path_buf(), &e));
            (String::new(), 0, 0)
        }
    };

    let lexed = lexer::classify(&content);
    if let Some(terminator) = &lexed.unterminated_heredoc {
        warnings.push(ScanWarning::parse_anomaly(
            path.to_path_buf(),
            format!("heredoc '{terminator}' never terminated; remainder of file treated as heredoc body"),
        ));
    }
    let extraction = extract::extract(&lexed.lines);

    ParsedScript {
        path: path.to_path_buf(),
        language,
        size_bytes,
        mtime_ns,
        line_count: lexed.lines.len() as u32,
        references: extraction.references,
        inactive: extraction.inactive,
        warnings,
    }
}

/// Final path component as a string.
fn basename_str(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File modification time in nanoseconds since the Unix epoch.
///
/// Falls back to 0 (with a warning) on platforms or files without one.
// Nanoseconds fit in i64 until the year 2262
#[allow(clippy::cast_possible_truncation)]
fn mtime_ns(path: &Path, metadata: &std::fs::Metadata) -> i64 {
    match metadata.modified() {
        Ok(mtime) => match mtime.duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_nanos() as i64,
            Err(e) => {
                warn!(
                    file = %path.display(),
                    error = %e,
                    "File modification time is before Unix epoch, using 0"
                );
                0
            }
        },
        Err(e) => {
            warn!(
                file = %path.display(),
                error = %e,
                "Platform does not support file modification time, using 0"
            );
            0
        }
    }
}

/// Current time in nanoseconds since the Unix epoch.
// Nanoseconds fit in i64 until the year 2262
#[allow(clippy::cast_possible_truncation)]
fn now_ns() -> Result<i64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .map_err(|e| {
            Error::Config(format!(
                "System clock is before Unix epoch: {e}. Fix system time before scanning."
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_roots() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let scripts = dir.path().join("scripts");
        let ctl = dir.path().join("ctl");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::create_dir_all(&ctl).unwrap();
        (dir, scripts, ctl)
    }

    #[test]
    fn new_creates_instance_and_store_location() {
        let (_dir, scripts, ctl) = temp_roots();
        let analyzer = Analyzer::new(&scripts, &ctl).expect("failed to create analyzer");

        assert!(analyzer.db_path().ends_with(".scriptmap/index.db"));
    }

    #[test]
    fn new_fails_for_missing_root() {
        let (_dir, scripts, _ctl) = temp_roots();
        let missing = scripts.join("nope");

        let err = Analyzer::new(&missing, &scripts).expect_err("missing root must fail");
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn analyze_empty_roots_reports_zero() {
        let (_dir, scripts, ctl) = temp_roots();
        let analyzer = Analyzer::new(&scripts, &ctl).unwrap();

        let report = analyzer.analyze().expect("scan failed");
        assert_eq!(report.scripts_scanned, 0);
        assert_eq!(report.control_files_found, 0);
        assert_eq!(report.edges_written, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn cancelled_token_aborts_before_write() {
        let (_dir, scripts, ctl) = temp_roots();
        std::fs::write(scripts.join("a.ksh"), "./b.ksh\n").unwrap();
        let analyzer = Analyzer::new(&scripts, &ctl).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = analyzer
            .analyze_with(ScanOptions::default(), &cancel)
            .expect_err("cancelled scan must fail");
        assert!(matches!(err, Error::Cancelled));

        // nothing was committed
        assert_eq!(analyzer.summary().unwrap().script_count, 0);
    }
}
