//! Integration tests for the scan pipeline.
//!
//! These tests exercise the full path:
//! directory tree → lexer → extractor → resolver → `SQLite`.

use std::fs;

use scriptmap::{
    Analyzer, CancelToken, InvocationStyle, ResolutionStatus, ScanOptions, ScanWarningKind,
    TargetKind,
};
use tempfile::TempDir;

/// Create a temporary corpus with the given files and an analyzer over it.
/// The same root serves as script root and control-file root.
/// Returns the temp directory (must be kept alive) and the analyzer.
fn corpus(files: &[(&str, &str)]) -> (TempDir, Analyzer) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("failed to write file");
    }

    let analyzer = Analyzer::new(dir.path(), dir.path()).expect("failed to create analyzer");
    (dir, analyzer)
}

fn forward_of(analyzer: &Analyzer, basename: &str) -> Vec<scriptmap::ForwardDependency> {
    let scripts = analyzer.scripts_named(basename).expect("lookup failed");
    assert_eq!(scripts.len(), 1, "expected exactly one script named {basename}");
    analyzer
        .forward_dependencies(scripts[0].id)
        .expect("forward query failed")
}

// ============================================================================
// Scenario tests
// ============================================================================

#[test]
fn sourced_and_direct_path_edges_with_lines_and_styles() {
    let (_dir, analyzer) = corpus(&[
        (
            "a.ksh",
            "#!/bin/ksh\n\n. ./config.ksh\n\necho working\n\n./b.ksh\n",
        ),
        ("config.ksh", "export ENV=prod\n"),
        ("b.ksh", "echo b\n"),
    ]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "a.ksh");
    assert_eq!(deps.len(), 2);

    assert_eq!(deps[0].target_kind, TargetKind::Script);
    assert_eq!(deps[0].target_name, "config.ksh");
    assert_eq!(deps[0].line, 3);
    assert_eq!(deps[0].style, InvocationStyle::Sourced);
    assert_eq!(deps[0].status, ResolutionStatus::Resolved);

    assert_eq!(deps[1].target_name, "b.ksh");
    assert_eq!(deps[1].line, 7);
    assert_eq!(deps[1].style, InvocationStyle::DirectPath);
    assert_eq!(deps[1].status, ResolutionStatus::Resolved);
}

#[test]
fn commented_invocation_produces_zero_edges() {
    let (_dir, analyzer) = corpus(&[("a.ksh", "# ./cleanup.ksh\n"), ("cleanup.ksh", "echo\n")]);
    analyzer.analyze().expect("scan failed");

    assert!(forward_of(&analyzer, "a.ksh").is_empty());
    assert_eq!(analyzer.summary().unwrap().edge_count(), 0);
}

#[test]
fn heredoc_procedure_call_yields_procedure_edge_only() {
    let (_dir, analyzer) = corpus(&[(
        "load.ksh",
        "sqlplus -s u/p@db <<EOF\n  select pkg.do_it() from dual;\nEOF\n",
    )]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "load.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].target_kind, TargetKind::Procedure);
    assert_eq!(deps[0].target_name, "pkg.do_it");
    assert_eq!(deps[0].line, 2);
    // no script edge for the heredoc terminator
    assert!(deps.iter().all(|d| d.target_kind != TargetKind::Script));
}

#[test]
fn control_file_reference_resolves_against_ctl_root() {
    let (_dir, analyzer) = corpus(&[
        ("jobs/load.ksh", "sqlldr userid=u/p@s control=customer_data.ctl\n"),
        ("ctl/customer_data.ctl", "LOAD DATA INFILE 'x.dat'\n"),
    ]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "load.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].target_kind, TargetKind::ControlFile);
    assert_eq!(deps[0].target_name, "customer_data.ctl");
    assert_eq!(deps[0].status, ResolutionStatus::Resolved);
    assert_eq!(deps[0].style, InvocationStyle::ControlOption);
}

#[test]
fn basename_collision_records_ambiguous_with_candidates() {
    let (_dir, analyzer) = corpus(&[
        ("driver.ksh", "level4_script.ksh\n"),
        ("east/level4_script.ksh", "echo east\n"),
        ("west/level4_script.ksh", "echo west\n"),
    ]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "driver.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].status, ResolutionStatus::Ambiguous);
    assert_eq!(deps[0].candidates.len(), 2);
    assert!(deps[0].candidates[0].ends_with("east/level4_script.ksh"));
    assert!(deps[0].candidates[1].ends_with("west/level4_script.ksh"));
}

#[test]
fn search_returns_matching_procedures_only() {
    let (_dir, analyzer) = corpus(&[
        (
            "one.ksh",
            "sqlplus <<EOF\nselect customer_pkg.process_customers() from dual;\nEOF\n",
        ),
        (
            "two.ksh",
            "sqlplus <<EOF\nselect CRM_EXTRACT.get_customer_data() from dual;\nselect order_mgmt.validate_orders() from dual;\nEOF\n",
        ),
    ]);
    analyzer.analyze().expect("scan failed");

    let hits = analyzer.search_procedures("customer").expect("search failed");
    let names: Vec<&str> = hits.iter().map(|h| h.qualified.as_str()).collect();
    assert_eq!(hits.len(), 2);
    assert!(names.contains(&"customer_pkg.process_customers"));
    assert!(names.contains(&"CRM_EXTRACT.get_customer_data"));
    assert!(!names.contains(&"order_mgmt.validate_orders"));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn missing_target_is_unresolved() {
    let (_dir, analyzer) = corpus(&[("a.ksh", "./ghost.ksh\n")]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "a.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].status, ResolutionStatus::Unresolved);
    assert!(deps[0].candidates.is_empty());
}

#[test]
fn relative_path_resolves_across_nesting() {
    let (_dir, analyzer) = corpus(&[
        ("daily/run.ksh", ". ../common/env.ksh\n"),
        ("common/env.ksh", "export A=1\n"),
    ]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "run.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].status, ResolutionStatus::Resolved);
}

#[test]
fn bare_name_resolves_to_unique_deeply_nested_script() {
    let (_dir, analyzer) = corpus(&[
        ("driver.ksh", "deep_job.ksh\n"),
        ("l1/l2/l3/l4/deep_job.ksh", "echo deep\n"),
    ]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "driver.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].status, ResolutionStatus::Resolved);
    assert_eq!(deps[0].style, InvocationStyle::BareName);
}

#[test]
fn resolution_is_deterministic_across_rescans() {
    let (_dir, analyzer) = corpus(&[
        ("driver.ksh", "dup.ksh\n"),
        ("east/dup.ksh", "echo east\n"),
        ("west/dup.ksh", "echo west\n"),
    ]);

    analyzer.analyze().expect("first scan failed");
    let first = forward_of(&analyzer, "driver.ksh");

    analyzer.analyze().expect("second scan failed");
    let second = forward_of(&analyzer, "driver.ksh");

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].status, second[0].status);
    assert_eq!(first[0].candidates, second[0].candidates);
}

// ============================================================================
// Boundary behaviors
// ============================================================================

#[test]
fn empty_file_has_zero_edges_and_zero_lines() {
    let (_dir, analyzer) = corpus(&[("empty.ksh", "")]);
    analyzer.analyze().expect("scan failed");

    let scripts = analyzer.scripts_named("empty.ksh").unwrap();
    assert_eq!(scripts[0].line_count, 0);
    assert!(forward_of(&analyzer, "empty.ksh").is_empty());
}

#[test]
fn shebang_only_file_has_zero_edges() {
    let (_dir, analyzer) = corpus(&[("bare.ksh", "#!/bin/ksh\n")]);
    analyzer.analyze().expect("scan failed");

    assert!(forward_of(&analyzer, "bare.ksh").is_empty());
}

#[test]
fn unterminated_heredoc_warns_and_suppresses_trailing_refs() {
    let (_dir, analyzer) = corpus(&[
        ("broken.ksh", "sqlplus <<EOF\nselect pkg.a() from dual;\n./never_reached.ksh\n"),
        ("never_reached.ksh", "echo\n"),
    ]);
    let report = analyzer.analyze().expect("scan failed");

    assert_eq!(report.warning_count(ScanWarningKind::ParseAnomaly), 1);

    let deps = forward_of(&analyzer, "broken.ksh");
    // the procedure in the heredoc body still counts; the script call after
    // it is heredoc body too, conservatively
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].target_kind, TargetKind::Procedure);
}

#[test]
fn invalid_utf8_warns_but_file_is_still_indexed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("legacy.ksh"),
        [b"echo ok\n./next.ksh\n".as_slice(), &[0xFF, 0xFE, b'\n']].concat(),
    )
    .unwrap();
    fs::write(dir.path().join("next.ksh"), "echo\n").unwrap();

    let analyzer = Analyzer::new(dir.path(), dir.path()).unwrap();
    let report = analyzer.analyze().expect("scan failed");

    assert_eq!(report.warning_count(ScanWarningKind::InvalidEncoding), 1);
    let deps = forward_of(&analyzer, "legacy.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].target_name, "next.ksh");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn unchanged_files_are_cache_hits_on_rescan() {
    let (_dir, analyzer) = corpus(&[
        ("a.ksh", "./b.ksh\n"),
        ("b.ksh", "echo b\n"),
    ]);

    let first = analyzer.analyze().expect("first scan failed");
    assert_eq!(first.scripts_scanned, 2);
    assert_eq!(first.scripts_cached, 0);

    let second = analyzer.analyze().expect("second scan failed");
    assert_eq!(second.scripts_scanned, 0);
    assert_eq!(second.scripts_cached, 2);

    // cached scripts keep their edges
    assert_eq!(forward_of(&analyzer, "a.ksh").len(), 1);
}

#[test]
fn modified_file_is_reparsed_and_edges_replaced() {
    let (dir, analyzer) = corpus(&[("a.ksh", "./b.ksh\n"), ("b.ksh", "echo\n"), ("c.ksh", "echo\n")]);
    analyzer.analyze().expect("first scan failed");

    // rewrite a.ksh to call c.ksh instead (content change also changes size)
    fs::write(dir.path().join("a.ksh"), "./c.ksh\n./c.ksh extra\n").unwrap();
    analyzer.analyze().expect("second scan failed");

    let deps = forward_of(&analyzer, "a.ksh");
    assert!(deps.iter().all(|d| d.target_name == "c.ksh"));
}

#[test]
fn vanished_script_is_marked_stale_and_kept() {
    let (dir, analyzer) = corpus(&[("a.ksh", "./b.ksh\n"), ("b.ksh", "echo\n")]);
    analyzer.analyze().expect("first scan failed");

    fs::remove_file(dir.path().join("b.ksh")).unwrap();
    let report = analyzer.analyze().expect("second scan failed");
    assert_eq!(report.scripts_marked_stale, 1);

    let b = analyzer.scripts_named("b.ksh").unwrap();
    assert_eq!(b.len(), 1, "stale script must be retained");
    assert!(b[0].stale);

    // historical edge from a.ksh survives
    let deps = forward_of(&analyzer, "a.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].status, ResolutionStatus::Resolved);
}

#[test]
fn pruning_scan_deletes_vanished_scripts_and_their_edges() {
    let (dir, analyzer) = corpus(&[("a.ksh", "./b.ksh\n"), ("b.ksh", "./a.ksh\n")]);
    analyzer.analyze().expect("first scan failed");

    fs::remove_file(dir.path().join("b.ksh")).unwrap();
    analyzer
        .analyze_with(ScanOptions { prune: true }, &CancelToken::new())
        .expect("pruning scan failed");

    assert!(analyzer.scripts_named("b.ksh").unwrap().is_empty());
    // b's outbound edges went with it
    let summary = analyzer.summary().unwrap();
    assert_eq!(summary.script_count, 1);

    // a's edge to the pruned b is downgraded, not left dangling
    let deps = forward_of(&analyzer, "a.ksh");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].status, ResolutionStatus::Unresolved);
}

#[test]
fn failed_scan_leaves_prior_state_intact() {
    let (dir, analyzer) = corpus(&[("a.ksh", "./b.ksh\n"), ("b.ksh", "echo\n")]);
    analyzer.analyze().expect("first scan failed");
    let before = analyzer.summary().unwrap();

    // a scan over a root that disappears mid-setup fails fast; the original
    // index must be untouched
    fs::remove_dir_all(dir.path().join("nonexistent")).ok();
    let missing = dir.path().join("nonexistent");
    let err = Analyzer::new(&missing, dir.path()).expect_err("missing root must fail");
    assert!(matches!(err, scriptmap::Error::InputNotFound(_)));

    assert_eq!(analyzer.summary().unwrap(), before);
}

#[test]
fn scan_skips_files_under_hidden_directories() {
    let (_dir, analyzer) = corpus(&[
        ("visible.ksh", "echo\n"),
        (".archive/old.ksh", "echo\n"),
    ]);
    let report = analyzer.analyze().expect("scan failed");

    assert_eq!(report.scripts_scanned, 1);
    assert!(analyzer.scripts_named("old.ksh").unwrap().is_empty());
}

#[test]
fn cancellation_rolls_back_everything() {
    let (_dir, analyzer) = corpus(&[("a.ksh", "./b.ksh\n"), ("b.ksh", "echo\n")]);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = analyzer
        .analyze_with(ScanOptions::default(), &cancel)
        .expect_err("cancelled scan must fail");
    assert!(matches!(err, scriptmap::Error::Cancelled));
    assert_eq!(analyzer.summary().unwrap().script_count, 0);
}

// ============================================================================
// Inactive references (debug surface)
// ============================================================================

#[test]
fn commented_references_are_queryable_but_not_edges() {
    let (_dir, analyzer) = corpus(&[
        ("a.ksh", "# ./cleanup.ksh\n./real.ksh\n"),
        ("real.ksh", "echo\n"),
        ("cleanup.ksh", "echo\n"),
    ]);
    analyzer.analyze().expect("scan failed");

    let a = &analyzer.scripts_named("a.ksh").unwrap()[0];

    let edges = analyzer.forward_dependencies(a.id).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target_name, "real.ksh");

    let inactive = analyzer.inactive_references(a.id).unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].target_name, "cleanup.ksh");
    assert_eq!(inactive[0].line, 1);

    // the commented call contributes nothing to backward lookups either
    let cleanup = &analyzer.scripts_named("cleanup.ksh").unwrap()[0];
    assert!(analyzer
        .backward_dependencies(cleanup.id.as_i64(), TargetKind::Script)
        .unwrap()
        .is_empty());
}

#[test]
fn ctl_root_separate_from_script_root() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    let ctl = dir.path().join("loader");
    fs::create_dir_all(&scripts).unwrap();
    fs::create_dir_all(&ctl).unwrap();
    fs::write(scripts.join("load.ksh"), "sqlldr control=orders.ctl\n").unwrap();
    fs::write(ctl.join("orders.ctl"), "LOAD DATA\n").unwrap();

    let analyzer = Analyzer::new(&scripts, &ctl).unwrap();
    let report = analyzer.analyze().expect("scan failed");
    assert_eq!(report.control_files_found, 1);

    let deps = forward_of(&analyzer, "load.ksh");
    assert_eq!(deps[0].status, ResolutionStatus::Resolved);
}

#[test]
fn interpreter_and_background_styles_are_recorded() {
    let (_dir, analyzer) = corpus(&[
        ("driver.ksh", "ksh worker.ksh\n./monitor.ksh &\n"),
        ("worker.ksh", "echo\n"),
        ("monitor.ksh", "echo\n"),
    ]);
    analyzer.analyze().expect("scan failed");

    let deps = forward_of(&analyzer, "driver.ksh");
    assert_eq!(deps.len(), 2);
    assert_eq!(deps[0].style, InvocationStyle::Interpreter);
    assert_eq!(deps[1].style, InvocationStyle::Background);
}

#[test]
fn store_survives_reopen() {
    let (dir, analyzer) = corpus(&[("a.ksh", "./b.ksh\n"), ("b.ksh", "echo\n")]);
    analyzer.analyze().expect("scan failed");
    drop(analyzer);

    let reopened = Analyzer::new(dir.path(), dir.path()).expect("reopen failed");
    assert_eq!(reopened.summary().unwrap().script_count, 2);
    assert_eq!(forward_of(&reopened, "a.ksh").len(), 1);
}

/// Scripts under multi-level nesting resolve and appear with absolute paths.
#[test]
fn deep_nesting_keeps_absolute_paths() {
    let (dir, analyzer) = corpus(&[("x/y/z/deep.ksh", "echo\n")]);
    analyzer.analyze().expect("scan failed");

    let scripts = analyzer.scripts_named("deep.ksh").unwrap();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].path.is_absolute());
    assert!(scripts[0]
        .path
        .starts_with(dir.path().canonicalize().unwrap()));
}
