//! `scriptmap forward` command implementation.

use std::path::Path;

use colored::Colorize;
use scriptmap::ResolutionStatus;

/// Run the forward command.
pub fn run(root: &Path, script: &str) -> Result<(), scriptmap::Error> {
    let analyzer = super::open(root)?;

    let matches = analyzer.scripts_named(script)?;
    if matches.is_empty() {
        println!("No indexed script named \"{script}\"");
        println!(
            "\n{}: Run '{}' to index the tree, then pass a basename like 'nightly_load.ksh'.",
            "hint".dimmed(),
            "scriptmap analyze".cyan()
        );
        return Ok(());
    }

    for script_row in &matches {
        let deps = analyzer.forward_dependencies(script_row.id)?;

        println!(
            "{} {}",
            script_row.path.display().to_string().bold(),
            if script_row.stale { "(stale)".yellow().to_string() } else { String::new() }
        );
        if deps.is_empty() {
            println!("  no outbound references");
            continue;
        }

        for dep in &deps {
            let status = match dep.status {
                ResolutionStatus::Resolved => "resolved".green(),
                ResolutionStatus::Unresolved => "unresolved".red(),
                ResolutionStatus::Ambiguous => "ambiguous".yellow(),
            };
            println!(
                "  line {:>4}  {:<12} {}  [{}, {status}]",
                dep.line,
                dep.target_kind.as_str(),
                dep.target_name.bold(),
                super::style_label(dep.style),
            );
            for candidate in &dep.candidates {
                println!("             {} {}", "candidate:".dimmed(), candidate.display());
            }
        }
    }

    Ok(())
}
