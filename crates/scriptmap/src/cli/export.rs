//! `scriptmap export` command implementation.

use std::path::Path;

use colored::Colorize;

/// Run the export command.
pub fn run(root: &Path, destination: &Path) -> Result<(), scriptmap::Error> {
    let analyzer = super::open(root)?;

    analyzer.export_to(destination)?;

    let summary = analyzer.summary()?;
    println!(
        "Exported {} scripts, {} control files, {} procedures, {} edges to {}",
        summary.script_count,
        summary.control_file_count,
        summary.procedure_count,
        summary.edge_count(),
        destination.display().to_string().green()
    );

    Ok(())
}
