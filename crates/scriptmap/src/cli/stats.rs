//! `scriptmap stats` command implementation.

use std::path::Path;

use colored::Colorize;

/// Run the stats command.
pub fn run(root: &Path) -> Result<(), scriptmap::Error> {
    let analyzer = super::open(root)?;
    let summary = analyzer.summary()?;

    println!("{}", "Index statistics".bold());
    println!("  scripts:       {}", summary.script_count);
    println!("  control files: {}", summary.control_file_count);
    println!("  procedures:    {}", summary.procedure_count);
    println!("  edges:         {}", summary.edge_count());
    for (kind, count) in &summary.edge_count_by_kind {
        println!("    {:<13} {count}", format!("{}:", kind.as_str()));
    }

    if summary.script_count == 0 {
        println!(
            "\n{}: The index is empty. Run '{}' to scan a tree.",
            "hint".dimmed(),
            "scriptmap analyze".cyan()
        );
    }

    Ok(())
}
