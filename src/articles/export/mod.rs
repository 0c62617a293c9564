//! Download formats for a finished article.

pub mod docx;
pub mod markdown;

use thiserror::Error;
use uuid::Uuid;

pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to build document: {0}")]
    Docx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Docx,
}

impl ExportFormat {
    /// `md` or `docx`, as used in download URLs.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "md" => Some(Self::Markdown),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Docx => "docx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => MARKDOWN_CONTENT_TYPE,
            Self::Docx => DOCX_CONTENT_TYPE,
        }
    }

    pub fn content_disposition(&self, id: Uuid) -> String {
        format!("attachment; filename=\"article-{id}.{}\"", self.extension())
    }
}
