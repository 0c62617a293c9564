use thiserror::Error;
use url::Url;

use crate::entities::SourceKind;
use crate::repositories::NewSource;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SourceInputError {
    #[error("Enter an absolute http(s) URL")]
    InvalidUrl,
    #[error("Unknown source type: {0}")]
    UnknownKind(String),
}

/// `feed`/`single`, plus the `rss`/`url` spellings older forms post.
pub fn parse_kind(raw: &str) -> Result<SourceKind, SourceInputError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "feed" | "rss" => Ok(SourceKind::Feed),
        "single" | "url" => Ok(SourceKind::Single),
        other => Err(SourceInputError::UnknownKind(other.to_string())),
    }
}

pub fn is_valid_source_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// Trim and validate the add-source form. A blank label becomes `None`.
pub fn new_source(url: &str, label: &str, kind: &str) -> Result<NewSource, SourceInputError> {
    let url = url.trim();
    if !is_valid_source_url(url) {
        return Err(SourceInputError::InvalidUrl);
    }
    let label = label.trim();
    Ok(NewSource {
        url: url.to_string(),
        label: (!label.is_empty()).then(|| label.to_string()),
        kind: parse_kind(kind)?,
    })
}
