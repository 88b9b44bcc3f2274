use std::sync::LazyLock;

use regex::Regex;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r\f\v]*\n\s*").expect("paragraph regex must compile"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex must compile"));

/// Collapse whitespace, widen spaced hyphens into dashes and terminate the last sentence.
///
/// Equal to [`normalized_paragraphs`] joined with single spaces.
pub fn normalize_text(raw: &str) -> String {
    normalized_paragraphs(raw).join(" ")
}

/// Paragraphs of `raw` (split at blank lines), each normalized; empty for blank input.
///
/// Only the final paragraph receives the terminating period.
pub fn normalized_paragraphs(raw: &str) -> Vec<String> {
    let mut paragraphs: Vec<String> = PARAGRAPH_BREAK
        .split(raw.trim())
        .map(|paragraph| {
            WHITESPACE_RUN
                .replace_all(paragraph.trim(), " ")
                .replace(" - ", " \u{2014} ")
        })
        .filter(|paragraph| !paragraph.is_empty())
        .collect();
    if let Some(last) = paragraphs.last_mut() {
        if !last.ends_with(['.', '!', '?']) {
            last.push('.');
        }
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_collapses_and_period_is_appended() {
        assert_eq!(normalize_text("  hello \t  there\nfriend "), "hello there friend.");
        assert_eq!(normalize_text("Are you ok?"), "Are you ok?");
    }

    #[test]
    fn spaced_hyphen_becomes_dash() {
        assert_eq!(normalize_text("breathe - slowly"), "breathe \u{2014} slowly.");
        assert_eq!(normalize_text("well-being"), "well-being.");
    }

    #[test]
    fn blank_lines_separate_paragraphs() {
        let paragraphs = normalized_paragraphs("First idea.\n\n  \n Second   idea");
        assert_eq!(paragraphs, vec!["First idea.", "Second idea."]);
        assert_eq!(normalize_text("First idea.\n\n  \n Second   idea"), "First idea. Second idea.");
    }

    #[test]
    fn blank_input_has_no_paragraphs() {
        assert!(normalized_paragraphs(" \n\n\t").is_empty());
        assert_eq!(normalize_text(""), "");
    }
}
