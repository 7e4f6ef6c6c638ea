//! Reference extraction from classified script lines.
//!
//! Patterns are tried in a fixed order — stored-procedure call, control-file
//! reference, then the script-invocation styles — and the first pattern to
//! match a textual span wins: the matched span is consumed so one invocation
//! never yields two reference records of different kinds.
//!
//! Active lines are eligible for every pattern. Heredoc bodies are inspected
//! for stored-procedure calls only (they are input fed to another program,
//! not shell code). Comment lines produce *inactive* records for the debug
//! surface instead of references.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::lexer::{ClassifiedLine, LineClass};
use crate::types::{InvocationStyle, TargetKind};

/// A stored-procedure call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRef {
    /// Qualified form as written, case preserved
    pub qualified: String,
    /// Schema component (three-part form only)
    pub schema: Option<String>,
    /// Package component (two- and three-part forms)
    pub package: Option<String>,
    /// Procedure/function name
    pub name: String,
    /// 1-indexed line number
    pub line: u32,
    /// The call-site line, trimmed
    pub raw: String,
}

/// A control-file reference (`control=<path>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFileRef {
    /// The path token as written
    pub written: String,
    /// Final path component
    pub basename: String,
    /// 1-indexed line number
    pub line: u32,
    /// The call-site line, trimmed
    pub raw: String,
}

/// A script invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRef {
    /// The path token as written
    pub written: String,
    /// Final path component
    pub basename: String,
    /// Which syntax matched
    pub style: InvocationStyle,
    /// 1-indexed line number
    pub line: u32,
    /// The call-site line, trimmed
    pub raw: String,
}

/// A raw reference record produced by the extractor, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawReference {
    Procedure(ProcedureRef),
    ControlFile(ControlFileRef),
    Script(ScriptRef),
}

/// A reference found on a commented line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveRef {
    /// What the commented text would have targeted
    pub target_kind: TargetKind,
    /// Basename or qualified form as written
    pub target_name: String,
    /// 1-indexed line number
    pub line: u32,
    /// The commented line, trimmed
    pub raw: String,
}

/// Everything extracted from one file.
#[derive(Debug, Default)]
pub struct Extraction {
    /// References from active lines and heredoc bodies
    pub references: Vec<RawReference>,
    /// Would-be references from comment lines
    pub inactive: Vec<InactiveRef>,
}

// Pattern order is part of the external contract: A stored procedure,
// B control file, then script styles sourced / direct path / bare name /
// interpreter. A span consumed by an earlier pattern is dead to later ones.

/// A. `select <qualified>(<args>) from dual`, keywords case-insensitive.
/// Args may be empty and may contain quoted strings and one level of nesting.
static PROCEDURE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bselect\s+([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+){0,2})\s*\((?:[^()'"]|'[^']*'|"[^"]*"|\([^()]*\))*\)\s+from\s+dual\b"#,
    )
    .expect("procedure pattern is valid")
});

/// B. `control=<path>` with a filesystem-safe token ending in `.ctl`.
static CONTROL_OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcontrol\s*=\s*([A-Za-z0-9_$./\-]*[A-Za-z0-9_\-]\.ctl)\b")
        .expect("control pattern is valid")
});

/// C1. `. path.ksh` / `source path.ksh` at the start of the line.
static SOURCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\.|source)\s+([^\s;|&(){}]+\.(?i:ksh|sh))\b").expect("sourced pattern is valid")
});

/// C2. A path token containing a directory separator.
static DIRECT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s;|&({])([A-Za-z0-9_.$\{\}~/\-]*/[A-Za-z0-9_.\-]+\.(?i:ksh|sh))\b")
        .expect("direct path pattern is valid")
});

/// C3. A bare `name.ksh` at command position.
static BARE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[;|&({])\s*([A-Za-z0-9_.\-]+\.(?i:ksh|sh))\b")
        .expect("bare name pattern is valid")
});

/// C4. Explicit interpreter: `ksh x.ksh`, `bash x.sh`, `sh x.sh`.
static INTERPRETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s;|&({])(?:ksh|bash|sh)\s+([^\s;|&(){}]+\.(?i:ksh|sh))\b")
        .expect("interpreter pattern is valid")
});

/// Extract all references from the classified lines of one file.
#[must_use]
pub fn extract(lines: &[ClassifiedLine]) -> Extraction {
    let mut out = Extraction::default();

    for line in lines {
        match line.class {
            LineClass::Active => extract_active(line, &mut out.references),
            LineClass::HeredocBody => extract_procedures(line, &mut out.references),
            LineClass::Comment => extract_inactive(line, &mut out.inactive),
        }
    }

    out
}

/// Run every pattern over one active line, consuming matched spans.
fn extract_active(line: &ClassifiedLine, refs: &mut Vec<RawReference>) {
    let text = line.scan_text.as_str();
    let raw = line.raw.trim();
    let mut consumed: Vec<Range<usize>> = Vec::new();

    for caps in PROCEDURE_CALL.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        if overlaps_any(&consumed, &whole.range()) {
            continue;
        }
        consumed.push(whole.range());
        refs.push(RawReference::Procedure(procedure_ref(
            &caps[1], line.number, raw,
        )));
    }

    for caps in CONTROL_OPTION.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        if overlaps_any(&consumed, &whole.range()) {
            continue;
        }
        consumed.push(whole.range());
        let written = caps[1].to_string();
        refs.push(RawReference::ControlFile(ControlFileRef {
            basename: basename_of(&written),
            written,
            line: line.number,
            raw: raw.to_string(),
        }));
    }

    let script_patterns: [(&Regex, InvocationStyle); 4] = [
        (&SOURCED, InvocationStyle::Sourced),
        (&DIRECT_PATH, InvocationStyle::DirectPath),
        (&BARE_NAME, InvocationStyle::BareName),
        (&INTERPRETER, InvocationStyle::Interpreter),
    ];

    for (pattern, style) in script_patterns {
        for caps in pattern.captures_iter(text) {
            let token = caps.get(1).expect("script patterns have one capture");
            if overlaps_any(&consumed, &token.range()) {
                continue;
            }
            let whole = caps.get(0).expect("group 0 always present");
            consumed.push(whole.range());

            let style = if runs_in_background(text, whole.end()) {
                InvocationStyle::Background
            } else {
                style
            };
            let written = token.as_str().to_string();
            refs.push(RawReference::Script(ScriptRef {
                basename: basename_of(&written),
                written,
                style,
                line: line.number,
                raw: raw.to_string(),
            }));
        }
    }
}

/// Heredoc bodies carry input for another program; only stored-procedure
/// calls are meaningful there.
fn extract_procedures(line: &ClassifiedLine, refs: &mut Vec<RawReference>) {
    let raw = line.raw.trim();
    for caps in PROCEDURE_CALL.captures_iter(&line.scan_text) {
        refs.push(RawReference::Procedure(procedure_ref(
            &caps[1], line.number, raw,
        )));
    }
}

/// Run the same pattern family over a comment line, recording what it
/// *would* have referenced.
fn extract_inactive(line: &ClassifiedLine, inactive: &mut Vec<InactiveRef>) {
    let mut refs = Vec::new();
    let probe = ClassifiedLine {
        number: line.number,
        raw: line.raw.clone(),
        class: LineClass::Active,
        scan_text: line.scan_text.clone(),
    };
    extract_active(&probe, &mut refs);

    for r in refs {
        let (target_kind, target_name) = match r {
            RawReference::Procedure(p) => (TargetKind::Procedure, p.qualified),
            RawReference::ControlFile(c) => (TargetKind::ControlFile, c.basename),
            RawReference::Script(s) => (TargetKind::Script, s.basename),
        };
        inactive.push(InactiveRef {
            target_kind,
            target_name,
            line: line.number,
            raw: line.raw.trim().to_string(),
        });
    }
}

/// Split a qualified procedure name into its components.
fn procedure_ref(qualified: &str, line: u32, raw: &str) -> ProcedureRef {
    let parts: Vec<&str> = qualified.split('.').collect();
    let (schema, package, name) = match parts.as_slice() {
        [name] => (None, None, (*name).to_string()),
        [package, name] => (None, Some((*package).to_string()), (*name).to_string()),
        [schema, package, name] => (
            Some((*schema).to_string()),
            Some((*package).to_string()),
            (*name).to_string(),
        ),
        _ => unreachable!("pattern caps qualified names at three parts"),
    };
    ProcedureRef {
        qualified: qualified.to_string(),
        schema,
        package,
        name,
        line,
        raw: raw.to_string(),
    }
}

/// True when the text after a match trails into a single `&` (not `&&`).
fn runs_in_background(text: &str, match_end: usize) -> bool {
    let rest = text[match_end..].trim_start();
    rest.starts_with('&') && !rest.starts_with("&&")
}

fn overlaps_any(consumed: &[Range<usize>], candidate: &Range<usize>) -> bool {
    consumed
        .iter()
        .any(|r| candidate.start < r.end && r.start < candidate.end)
}

fn basename_of(written: &str) -> String {
    written
        .rsplit('/')
        .next()
        .unwrap_or(written)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::classify;

    fn extract_str(content: &str) -> Extraction {
        extract(&classify(content).lines)
    }

    fn scripts(ex: &Extraction) -> Vec<&ScriptRef> {
        ex.references
            .iter()
            .filter_map(|r| match r {
                RawReference::Script(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn procedures(ex: &Extraction) -> Vec<&ProcedureRef> {
        ex.references
            .iter()
            .filter_map(|r| match r {
                RawReference::Procedure(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    // === Script invocation styles ===

    #[test]
    fn sourced_with_dot() {
        let ex = extract_str(". ./config.ksh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].basename, "config.ksh");
        assert_eq!(s[0].written, "./config.ksh");
        assert_eq!(s[0].style, InvocationStyle::Sourced);
    }

    #[test]
    fn sourced_with_source_keyword() {
        let ex = extract_str("source ../env/setup.sh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].basename, "setup.sh");
        assert_eq!(s[0].style, InvocationStyle::Sourced);
    }

    #[test]
    fn direct_path_invocation() {
        let ex = extract_str("./process.ksh\n../../cleanup.ksh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 2);
        assert!(s.iter().all(|r| r.style == InvocationStyle::DirectPath));
        assert_eq!(s[0].basename, "process.ksh");
        assert_eq!(s[1].basename, "cleanup.ksh");
        assert_eq!(s[1].written, "../../cleanup.ksh");
    }

    #[test]
    fn bare_name_at_command_position() {
        let ex = extract_str("nightly_load.ksh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].style, InvocationStyle::BareName);
        assert_eq!(s[0].basename, "nightly_load.ksh");
    }

    #[test]
    fn bare_name_after_connectives() {
        let ex = extract_str("check.ksh && load.ksh || recover.ksh ; report.ksh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 4);
        assert!(s.iter().all(|r| r.style == InvocationStyle::BareName));
    }

    #[test]
    fn bare_name_not_matched_mid_argument() {
        // `load.ksh` is an argument here, not a command
        let ex = extract_str("echo load.ksh\n");
        assert!(scripts(&ex).is_empty());
    }

    #[test]
    fn interpreter_invocation() {
        let ex = extract_str("ksh archive.ksh\nbash fix.sh\nsh tidy.sh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 3);
        assert!(s.iter().all(|r| r.style == InvocationStyle::Interpreter));
    }

    #[test]
    fn interpreter_with_path_records_direct_path() {
        // Pattern order puts direct-path before interpreter; the span is
        // consumed by the earlier pattern.
        let ex = extract_str("ksh jobs/archive.ksh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].style, InvocationStyle::DirectPath);
        assert_eq!(s[0].basename, "archive.ksh");
    }

    #[test]
    fn background_overrides_style() {
        let ex = extract_str("./long_job.ksh &\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].style, InvocationStyle::Background);
    }

    #[test]
    fn double_ampersand_is_not_background() {
        let ex = extract_str("./first.ksh && second.ksh\n");
        let s = scripts(&ex);
        assert_eq!(s[0].style, InvocationStyle::DirectPath);
        assert_eq!(s[1].style, InvocationStyle::BareName);
    }

    #[test]
    fn one_invocation_yields_one_record() {
        // `. ./config.ksh` must not also match as a direct path
        let ex = extract_str(". ./config.ksh\n");
        assert_eq!(ex.references.len(), 1);
    }

    #[test]
    fn variable_prefixed_path_is_a_direct_path() {
        let ex = extract_str("$SCRIPT_DIR/load_data.ksh\n");
        let s = scripts(&ex);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].basename, "load_data.ksh");
        assert_eq!(s[0].style, InvocationStyle::DirectPath);
    }

    // === Control files ===

    #[test]
    fn control_option_captures_basename() {
        let ex = extract_str("sqlldr userid=u/p@s control=customer_data.ctl log=x.log\n");
        assert_eq!(ex.references.len(), 1);
        match &ex.references[0] {
            RawReference::ControlFile(c) => {
                assert_eq!(c.basename, "customer_data.ctl");
                assert_eq!(c.written, "customer_data.ctl");
            }
            other => panic!("expected control file ref, got {other:?}"),
        }
    }

    #[test]
    fn control_option_with_directory_components() {
        let ex = extract_str("sqlldr control=ctl/regions/load_regions.ctl\n");
        match &ex.references[0] {
            RawReference::ControlFile(c) => {
                assert_eq!(c.basename, "load_regions.ctl");
                assert_eq!(c.written, "ctl/regions/load_regions.ctl");
            }
            other => panic!("expected control file ref, got {other:?}"),
        }
    }

    #[test]
    fn control_keyword_is_case_insensitive() {
        let ex = extract_str("sqlldr CONTROL=upper.ctl\n");
        assert_eq!(ex.references.len(), 1);
    }

    #[test]
    fn bare_ctl_token_without_control_option_is_ignored() {
        let ex = extract_str("echo customer_data.ctl\n");
        assert!(ex.references.is_empty());
    }

    // === Stored procedures ===

    #[test]
    fn procedure_in_heredoc() {
        let ex = extract_str("sqlplus -s u/p <<EOF\nselect pkg.do_it() from dual;\nEOF\n");
        let p = procedures(&ex);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].qualified, "pkg.do_it");
        assert_eq!(p[0].schema, None);
        assert_eq!(p[0].package.as_deref(), Some("pkg"));
        assert_eq!(p[0].name, "do_it");
        // the heredoc terminator must not become a script edge
        assert!(scripts(&ex).is_empty());
    }

    #[test]
    fn three_part_procedure_name() {
        let ex = extract_str("sqlplus <<SQL\nselect crm.extract_pkg.get_data('X', 1) from dual;\nSQL\n");
        let p = procedures(&ex);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].schema.as_deref(), Some("crm"));
        assert_eq!(p[0].package.as_deref(), Some("extract_pkg"));
        assert_eq!(p[0].name, "get_data");
    }

    #[test]
    fn single_part_procedure_name() {
        let ex = extract_str("sqlplus <<SQL\nselect refresh_stats() from dual;\nSQL\n");
        let p = procedures(&ex);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].schema, None);
        assert_eq!(p[0].package, None);
        assert_eq!(p[0].name, "refresh_stats");
    }

    #[test]
    fn procedure_keywords_case_insensitive_name_case_preserved() {
        let ex = extract_str("sqlplus <<SQL\nSELECT CRM_Extract.Get_Data() FROM DUAL;\nSQL\n");
        let p = procedures(&ex);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].qualified, "CRM_Extract.Get_Data");
    }

    #[test]
    fn procedure_args_allow_quotes_and_one_nesting_level() {
        let ex = extract_str(
            "sqlplus <<SQL\nselect pkg.load('a,b', to_date('2024-01-01')) from dual;\nSQL\n",
        );
        assert_eq!(procedures(&ex).len(), 1);
    }

    #[test]
    fn procedure_on_active_line_in_double_quotes() {
        let ex = extract_str("echo \"select ops.ping() from dual\" | sqlplus -s u/p\n");
        assert_eq!(procedures(&ex).len(), 1);
    }

    #[test]
    fn non_ascii_identifiers_do_not_match() {
        let ex = extract_str("sqlplus <<SQL\nselect pkg.fonctionnalité() from dual;\nSQL\n");
        assert!(procedures(&ex).is_empty());
    }

    #[test]
    fn select_without_from_dual_is_not_a_call() {
        let ex = extract_str("sqlplus <<SQL\nselect pkg.f(x) from customers;\nSQL\n");
        assert!(procedures(&ex).is_empty());
    }

    // === Comment handling ===

    #[test]
    fn commented_invocation_yields_no_reference() {
        let ex = extract_str("# ./cleanup.ksh\n");
        assert!(ex.references.is_empty());
    }

    #[test]
    fn commented_invocation_is_recorded_inactive() {
        let ex = extract_str("# ./cleanup.ksh\n");
        assert_eq!(ex.inactive.len(), 1);
        assert_eq!(ex.inactive[0].target_kind, TargetKind::Script);
        assert_eq!(ex.inactive[0].target_name, "cleanup.ksh");
        assert_eq!(ex.inactive[0].line, 1);
    }

    #[test]
    fn commented_control_option_is_recorded_inactive() {
        let ex = extract_str("# sqlldr control=old_load.ctl\n");
        assert!(ex.references.is_empty());
        assert_eq!(ex.inactive.len(), 1);
        assert_eq!(ex.inactive[0].target_kind, TargetKind::ControlFile);
        assert_eq!(ex.inactive[0].target_name, "old_load.ctl");
    }

    #[test]
    fn inline_comment_does_not_produce_reference() {
        let ex = extract_str("echo start # ./cleanup.ksh\n");
        assert!(ex.references.is_empty());
        // inline trailing comments are truncated, not captured as inactive
        assert!(ex.inactive.is_empty());
    }

    #[test]
    fn single_quoted_invocation_is_suppressed() {
        let ex = extract_str("echo './phantom.ksh'\n");
        assert!(ex.references.is_empty());
    }

    #[test]
    fn shebang_produces_nothing() {
        let ex = extract_str("#!/bin/ksh\n");
        assert!(ex.references.is_empty());
        assert!(ex.inactive.is_empty());
    }

    #[test]
    fn mixed_line_extracts_both_kinds_without_overlap() {
        let ex = extract_str("run_extract.ksh && sqlldr control=extract.ctl\n");
        assert_eq!(ex.references.len(), 2);
        let kinds: Vec<_> = ex
            .references
            .iter()
            .map(|r| match r {
                RawReference::Procedure(_) => "proc",
                RawReference::ControlFile(_) => "ctl",
                RawReference::Script(_) => "script",
            })
            .collect();
        assert!(kinds.contains(&"ctl"));
        assert!(kinds.contains(&"script"));
    }
}
