//! Line classification for shell scripts.
//!
//! Converts raw script text into a sequence of classified lines. Only
//! *active* lines are candidates for script and control-file references;
//! heredoc bodies are still inspected for embedded stored-procedure calls.
//!
//! The classifier is deliberately minimal shell lexing, not a grammar:
//! it tracks one piece of state across lines (an open heredoc) and is
//! otherwise line-local.

use std::sync::LazyLock;

use regex::Regex;

/// Classification of a single script line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Shell code; eligible for all reference patterns
    Active,
    /// A `#` comment (the line-1 shebang is not a comment)
    Comment,
    /// Inside a heredoc, including the terminator line
    HeredocBody,
}

/// A classified line of script text.
#[derive(Debug, Clone)]
pub struct ClassifiedLine {
    /// 1-indexed line number
    pub number: u32,
    /// The line exactly as read
    pub raw: String,
    /// Classification
    pub class: LineClass,
    /// Text prepared for pattern matching.
    ///
    /// For active lines: single-quoted regions blanked to spaces and the text
    /// truncated at the first unquoted `#`, so column offsets of surviving
    /// text are unchanged. For comments: the text after the leading `#`s,
    /// sanitized the same way. For heredoc bodies: the raw line.
    pub scan_text: String,
}

/// Result of classifying one file.
#[derive(Debug)]
pub struct LexOutput {
    /// All lines of the file, in order
    pub lines: Vec<ClassifiedLine>,
    /// The terminator token of a heredoc that was still open at end of file
    pub unterminated_heredoc: Option<String>,
}

/// The heredoc redirection operator.
///
/// Herestrings (`<<<`) are excluded by a neighbor check at the match site.
static HEREDOC_OP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<-?").expect("heredoc operator pattern is valid"));

/// The terminator token after the operator: `EOF`, `"EOF"`, `'EOF'`.
static HEREDOC_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*["']?([A-Za-z_][A-Za-z0-9_]*)["']?"#)
        .expect("heredoc terminator pattern is valid")
});

/// Classify the lines of one script.
pub fn classify(content: &str) -> LexOutput {
    let mut lines = Vec::new();
    let mut open_heredoc: Option<String> = None;

    for (idx, raw) in content.lines().enumerate() {
        let number = (idx + 1) as u32;

        if let Some(terminator) = open_heredoc.as_deref() {
            let is_terminator = raw.trim() == terminator;
            lines.push(ClassifiedLine {
                number,
                raw: raw.to_string(),
                class: LineClass::HeredocBody,
                scan_text: raw.to_string(),
            });
            if is_terminator {
                open_heredoc = None;
            }
            continue;
        }

        let trimmed = raw.trim_start();
        let is_shebang = number == 1 && trimmed.starts_with("#!");
        if trimmed.starts_with('#') && !is_shebang {
            let body = trimmed.trim_start_matches('#');
            lines.push(ClassifiedLine {
                number,
                raw: raw.to_string(),
                class: LineClass::Comment,
                scan_text: sanitize(body).comment_trimmed,
            });
            continue;
        }

        let scan_text = sanitize(raw).comment_trimmed;
        if let Some(terminator) = find_heredoc_opener(&scan_text, raw) {
            open_heredoc = Some(terminator);
        }
        lines.push(ClassifiedLine {
            number,
            raw: raw.to_string(),
            class: LineClass::Active,
            scan_text,
        });
    }

    LexOutput {
        lines,
        unterminated_heredoc: open_heredoc,
    }
}

/// Output of the quote-aware line scan.
struct Sanitized {
    /// Single quotes blanked to spaces, truncated at the first unquoted `#`
    comment_trimmed: String,
}

/// Scan a line once, tracking quote state.
///
/// Single-quoted content is blanked (suppressing all pattern matching inside
/// it) while double-quoted content survives. An unquoted `#` ends the
/// scannable portion of the line. Blanking replaces each character with as
/// many spaces as it had bytes, so byte offsets into the result index the
/// original line as well.
fn sanitize(line: &str) -> Sanitized {
    let mut blanked = String::with_capacity(line.len());
    let mut chars = line.chars();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        if in_single {
            if c == '\'' {
                in_single = false;
            }
            blank(&mut blanked, c);
            continue;
        }
        if in_double {
            if c == '\\' {
                // keep the escaped character from closing the string
                blanked.push(c);
                if let Some(next) = chars.next() {
                    blanked.push(next);
                }
                continue;
            }
            if c == '"' {
                in_double = false;
            }
            blanked.push(c);
            continue;
        }
        match c {
            '\'' => {
                in_single = true;
                blank(&mut blanked, c);
            }
            '"' => {
                in_double = true;
                blanked.push(c);
            }
            '#' => break,
            _ => blanked.push(c),
        }
    }

    Sanitized {
        comment_trimmed: blanked,
    }
}

/// Replace one character with spaces of the same byte width.
fn blank(out: &mut String, c: char) {
    for _ in 0..c.len_utf8() {
        out.push(' ');
    }
}

/// Find a heredoc opener on an active line, skipping `<<<` herestrings.
///
/// The operator is located on the sanitized text (a `<<` inside a string
/// does not count); the terminator token is then read from the raw line at
/// the same byte offset, because a quoted terminator (`<<'EOF'`) is blanked
/// in the sanitized text.
fn find_heredoc_opener(scan: &str, raw: &str) -> Option<String> {
    for m in HEREDOC_OP.find_iter(scan) {
        if scan[..m.start()].ends_with('<') || scan[m.end()..].starts_with('<') {
            continue;
        }
        if let Some(caps) = HEREDOC_TERM.captures(&raw[m.end()..]) {
            return Some(caps[1].to_string());
        }
    }
    None
}
