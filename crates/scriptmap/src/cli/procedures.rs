//! `scriptmap procedures` command implementation.

use std::path::Path;

use colored::Colorize;

/// Run the procedures command.
pub fn run(root: &Path) -> Result<(), scriptmap::Error> {
    let analyzer = super::open(root)?;

    let catalog = analyzer.procedure_catalog()?;
    if catalog.is_empty() {
        println!("No stored procedures in the index");
        println!(
            "\n{}: Run '{}' first.",
            "hint".dimmed(),
            "scriptmap analyze".cyan()
        );
        return Ok(());
    }

    println!(
        "{} distinct procedures:",
        catalog.len().to_string().green().bold()
    );
    println!();
    for usage in &catalog {
        println!(
            "  {:<50} {} call sites",
            usage.procedure.qualified.bold(),
            usage.call_count
        );
    }

    Ok(())
}
