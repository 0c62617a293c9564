pub mod model;
pub mod reader;

pub use model::{ExtractedText, normalize_whitespace};

use url::Url;

/// Reduces page markup to article text.
///
/// Implementations never fail: a page with nothing readable produces empty
/// text, and the caller decides whether that is acceptable.
#[cfg_attr(test, mockall::automock)]
pub trait TextExtractor: Send + Sync {
    fn extract(&self, html: &str, url: &Url) -> ExtractedText;
}

/// `readability` first, then a selector-based fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadabilityExtractor;

impl TextExtractor for ReadabilityExtractor {
    fn extract(&self, html: &str, url: &Url) -> ExtractedText {
        let raw = reader::extract(html, url);
        ExtractedText {
            title: raw.title.map(|t| normalize_whitespace(&t)),
            text: normalize_whitespace(&raw.text),
        }
    }
}
