//! `scriptmap backward` command implementation.

use std::path::Path;

use colored::Colorize;
use scriptmap::TargetKind;

/// Run the backward command.
pub fn run(root: &Path, name: &str, kind: &str) -> Result<(), scriptmap::Error> {
    let kind = parse_kind(kind).ok_or_else(|| {
        scriptmap::Error::Config(format!(
            "unknown target kind '{kind}'. Valid kinds: script, control_file, procedure"
        ))
    })?;
    let analyzer = super::open(root)?;

    // Resolve the named target to one or more row ids
    let targets: Vec<(i64, String)> = match kind {
        TargetKind::Script => analyzer
            .scripts_named(name)?
            .into_iter()
            .map(|s| (s.id.as_i64(), s.path.display().to_string()))
            .collect(),
        TargetKind::ControlFile => analyzer
            .store()
            .get_control_files_by_basename(name)?
            .into_iter()
            .map(|c| (c.id.as_i64(), c.path.display().to_string()))
            .collect(),
        TargetKind::Procedure => analyzer
            .store()
            .get_procedure_by_qualified(name)?
            .into_iter()
            .map(|p| (p.id.as_i64(), p.qualified))
            .collect(),
    };

    if targets.is_empty() {
        println!("No indexed {} named \"{name}\"", kind.as_str());
        return Ok(());
    }

    for (target_id, label) in &targets {
        let callers = analyzer.backward_dependencies(*target_id, kind)?;

        println!("{}", label.bold());
        if callers.is_empty() {
            println!("  nothing in the corpus references this");
            continue;
        }
        for caller in &callers {
            println!(
                "  {}  line {} [{}]",
                caller.source_path.display(),
                caller.line,
                super::style_label(caller.style)
            );
        }
    }

    Ok(())
}

fn parse_kind(s: &str) -> Option<TargetKind> {
    match s {
        "script" => Some(TargetKind::Script),
        "control_file" | "ctl" => Some(TargetKind::ControlFile),
        "procedure" | "proc" => Some(TargetKind::Procedure),
        _ => None,
    }
}
