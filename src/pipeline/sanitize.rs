//! Text cleanup for values moving between table, card and document.
//!
//! Survey exports carry Windows line endings, zero-width characters pasted
//! from word processors, and runs of blank lines. Card files carry YAML-ish
//! `|` block markers that must not reach the printed page. Each rule below is
//! a pure `&str → String` pass so they can be combined per use.
//!
//! ## Rule sets
//!
//! * [`clean_field`] — any value substituted into a card
//! * [`clean_block_text`] — free-text fields read back from a card
//! * [`latex_escape`] — values rendered into the LaTeX document

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise a raw table value for substitution into a card.
///
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Collapse 3+ consecutive newlines down to one blank line
/// 4. Trim surrounding whitespace
pub fn clean_field(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Clean a multi-line free-text value read back from a card file.
///
/// Every literal `|` is removed (leftover block-scalar markers), each line's
/// indentation is trimmed, and the whole value is trimmed.
pub fn clean_block_text(input: &str) -> String {
    let s = clean_field(input).replace('|', "");
    let s = trim_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 4: Trim every line ─────────────────────────────────────────────────

fn trim_lines(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── LaTeX escaping ──────────────────────────────────────────────────────────

/// Escape LaTeX special characters so free text typesets literally.
pub fn latex_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible_chars() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n  \n\t\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn clean_field_trims_and_normalises() {
        assert_eq!(clean_field("  Marsh\r\nrestoration \u{200B} "), "Marsh\nrestoration");
    }

    #[test]
    fn block_text_strips_pipes_and_indentation() {
        assert_eq!(clean_block_text("|\n  Restore the\n  wetland |"), "Restore the\nwetland");
        assert_eq!(clean_block_text("| single line"), "single line");
    }

    #[test]
    fn latex_specials_are_escaped() {
        assert_eq!(latex_escape("50% & $5 #1 a_b"), r"50\% \& \$5 \#1 a\_b");
        assert_eq!(latex_escape(r"{x}\y"), r"\{x\}\textbackslash{}y");
        assert_eq!(latex_escape("~^"), r"\textasciitilde{}\textasciicircum{}");
        assert_eq!(latex_escape("plain"), "plain");
    }
}
