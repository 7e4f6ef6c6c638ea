//! `scriptmap search` command implementation.

use std::path::Path;

use colored::Colorize;

/// Run the search command.
pub fn run(root: &Path, needle: &str, limit: usize) -> Result<(), scriptmap::Error> {
    let analyzer = super::open(root)?;

    let mut hits = analyzer.search_procedures(needle)?;
    let total = hits.len();
    hits.truncate(limit);

    if hits.is_empty() {
        println!("No procedure calls match \"{needle}\"");

        let summary = analyzer.summary()?;
        if summary.procedure_count == 0 {
            println!(
                "\n{}: The index has no procedures. Run '{}' first.",
                "hint".dimmed(),
                "scriptmap analyze".cyan()
            );
        }
        return Ok(());
    }

    println!(
        "Found {} call sites matching \"{}\":",
        total.to_string().green().bold(),
        needle.cyan()
    );
    println!();

    for hit in &hits {
        println!(
            "  {}  {}:{}",
            hit.qualified.bold(),
            hit.source_path.display(),
            hit.line
        );
    }
    if total > hits.len() {
        println!(
            "\n{} showing {} of {total}; raise --limit to see more",
            "note:".dimmed(),
            hits.len()
        );
    }

    Ok(())
}
