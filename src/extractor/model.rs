use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Readable text pulled out of a page, plus the best title guess.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub title: Option<String>,
    pub text: String,
}

impl ExtractedText {
    /// Length in characters after trimming, the measure the quality gate uses.
    pub fn char_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

static SPACE_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

static BLANK_LINES_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Collapse horizontal whitespace, trim every line and keep at most one blank
/// line between paragraphs.
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let spaced = SPACE_RUN_REGEX.replace_all(&text, " ");

    let trimmed_lines = spaced
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_LINES_REGEX
        .replace_all(trimmed_lines.trim(), "\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_whitespace() {
        let text = "  Hello    world  \n\n\n  Test  ";
        assert_eq!(normalize_whitespace(text), "Hello world\n\nTest");
    }

    #[test]
    fn test_normalize_keeps_single_line_breaks() {
        let text = "Line one\r\nLine\ttwo\n\n\n\n\nNext paragraph";
        assert_eq!(
            normalize_whitespace(text),
            "Line one\nLine two\n\nNext paragraph"
        );
    }

    #[test]
    fn test_char_len_counts_characters_not_bytes() {
        let extracted = ExtractedText {
            title: None,
            text: "  საქართველო  ".to_string(),
        };
        assert_eq!(extracted.char_len(), 10);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in "[a-z \t\n]{0,200}") {
            let once = normalize_whitespace(&input);
            prop_assert_eq!(normalize_whitespace(&once), once.clone());
        }

        #[test]
        fn normalize_leaves_no_space_runs_or_edges(input in "[a-z \t\n]{0,200}") {
            let out = normalize_whitespace(&input);
            prop_assert!(!out.contains("  "));
            prop_assert!(!out.contains("\n\n\n"));
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
