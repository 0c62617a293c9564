pub mod openai;

pub use openai::{OpenAiGenerator, OpenAiSettings};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::ErrorKind;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("OpenAI returned empty response")]
    Empty,
    #[error("OpenAI output did not match schema: {0}")]
    Schema(String),
    #[error("OpenAI output source_url mismatch")]
    UrlMismatch,
    #[error("OpenAI API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("OpenAI request failed: {0}")]
    Transport(String),
    #[error("OpenAI request timed out")]
    Timeout,
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Empty => ErrorKind::GenerationEmpty,
            GenerationError::Schema(_) => ErrorKind::GenerationSchema,
            GenerationError::UrlMismatch => ErrorKind::GenerationUrlMismatch,
            GenerationError::Api { .. } | GenerationError::Transport(_) | GenerationError::Timeout => {
                ErrorKind::Generation
            }
        }
    }
}

/// The bilingual article the model must return. Every field is required and
/// nothing else is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedArticle {
    pub title_en: String,
    pub brief_en: String,
    pub article_en: String,
    pub title_ge: String,
    pub brief_ge: String,
    pub article_ge: String,
    pub source_url: String,
}

impl GeneratedArticle {
    /// The model must echo the URL it was given, byte for byte.
    pub fn verify_source(self, source_url: &str) -> Result<Self, GenerationError> {
        if self.source_url == source_url {
            Ok(self)
        } else {
            Err(GenerationError::UrlMismatch)
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    async fn generate(
        &self,
        extracted_text: &str,
        source_url: &str,
    ) -> Result<GeneratedArticle, GenerationError>;
}

/// Turn the model's message content into a checked article.
pub fn parse_completion(
    content: Option<&str>,
    source_url: &str,
) -> Result<GeneratedArticle, GenerationError> {
    let content = content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(GenerationError::Empty)?;

    let article: GeneratedArticle =
        serde_json::from_str(content).map_err(|e| GenerationError::Schema(e.to_string()))?;

    article.verify_source(source_url)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_json(source_url: &str) -> serde_json::Value {
        json!({
            "title_en": "Council passes budget",
            "brief_en": "The council passed the budget.",
            "article_en": "Body in English.\n\nKey takeaways\n- Budget passed",
            "title_ge": "საბჭომ ბიუჯეტი მიიღო",
            "brief_ge": "საბჭომ ბიუჯეტი მიიღო.",
            "article_ge": "ტექსტი ქართულად.",
            "source_url": source_url,
        })
    }

    #[test]
    fn parses_valid_output() {
        let url = "https://news.example/a";
        let content = sample_json(url).to_string();
        let article = parse_completion(Some(&content), url).unwrap();
        assert_eq!(article.title_en, "Council passes budget");
        assert_eq!(article.source_url, url);
    }

    #[test]
    fn missing_or_blank_content_is_empty() {
        assert!(matches!(
            parse_completion(None, "https://x/a"),
            Err(GenerationError::Empty)
        ));
        assert!(matches!(
            parse_completion(Some("   "), "https://x/a"),
            Err(GenerationError::Empty)
        ));
    }

    #[test]
    fn malformed_json_is_schema_error() {
        let err = parse_completion(Some("{not json"), "https://x/a").unwrap_err();
        assert!(matches!(err, GenerationError::Schema(_)));
        assert_eq!(err.kind(), ErrorKind::GenerationSchema);
    }

    #[test]
    fn missing_field_is_schema_error() {
        let mut value = sample_json("https://x/a");
        value.as_object_mut().unwrap().remove("article_ge");
        let err = parse_completion(Some(&value.to_string()), "https://x/a").unwrap_err();
        assert!(matches!(err, GenerationError::Schema(_)));
    }

    #[test]
    fn extra_field_is_schema_error() {
        let mut value = sample_json("https://x/a");
        value["tags"] = json!(["politics"]);
        let err = parse_completion(Some(&value.to_string()), "https://x/a").unwrap_err();
        assert!(matches!(err, GenerationError::Schema(_)));
    }

    #[test]
    fn different_source_url_is_rejected() {
        let content = sample_json("https://x/b").to_string();
        let err = parse_completion(Some(&content), "https://x/a").unwrap_err();
        assert!(matches!(err, GenerationError::UrlMismatch));
        assert_eq!(err.to_string(), "OpenAI output source_url mismatch");
    }
}
