//! CLI command implementations.

pub mod analyze;
pub mod backward;
pub mod export;
pub mod forward;
pub mod procedures;
pub mod search;
pub mod stats;

use std::path::Path;

use scriptmap::Analyzer;

/// Open the analyzer for query commands: both roots default to the script
/// root, matching where `analyze` put the index.
pub fn open(root: &Path) -> Result<Analyzer, scriptmap::Error> {
    Analyzer::new(root, root)
}

/// Render an invocation style for terminal output.
pub fn style_label(style: scriptmap::InvocationStyle) -> &'static str {
    use scriptmap::InvocationStyle::*;
    match style {
        Sourced => "sourced",
        DirectPath => "direct path",
        BareName => "bare name",
        Interpreter => "interpreter",
        Background => "background",
        ControlOption => "control option",
        ProcedureCall => "procedure call",
    }
}
