//! `scriptmap analyze` command implementation.

use std::path::Path;

use colored::Colorize;
use scriptmap::{Analyzer, CancelToken, ScanOptions, ScanWarningKind};

/// Run the analyze command.
pub fn run(root: &Path, ctl_root: Option<&Path>, prune: bool) -> Result<(), scriptmap::Error> {
    let ctl_root = ctl_root.unwrap_or(root);
    let analyzer = Analyzer::new(root, ctl_root)?;

    let report = analyzer.analyze_with(ScanOptions { prune }, &CancelToken::new())?;

    println!(
        "Scanned {} scripts ({} unchanged), {} control files in {:.2?}",
        report.scripts_scanned.to_string().green().bold(),
        report.scripts_cached,
        report.control_files_found,
        report.duration
    );
    println!("{} edges indexed", report.edges_written.to_string().green());
    if report.scripts_marked_stale > 0 {
        println!(
            "{} scripts no longer on disk, marked stale",
            report.scripts_marked_stale.to_string().yellow()
        );
    }

    // Warning summary: counts per kind with a sample of offending paths
    for kind in [
        ScanWarningKind::InputUnreadable,
        ScanWarningKind::InvalidEncoding,
        ScanWarningKind::ParseAnomaly,
    ] {
        let count = report.warning_count(kind);
        if count == 0 {
            continue;
        }
        println!("\n{}: {count}", kind.to_string().yellow().bold());
        for path in report.sample_paths(kind) {
            println!("  {}", path.display());
        }
        let shown = report.sample_paths(kind).len();
        if count > shown {
            println!("  {} and {} more", "...".dimmed(), count - shown);
        }
    }

    Ok(())
}
