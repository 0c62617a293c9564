use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// --- PostgreSQL Enums ---
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(type_name = "source_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Single,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Single => "single",
        }
    }
}

#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "article_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Queued => "queued",
            ArticleStatus::Processing => "processing",
            ArticleStatus::Done => "done",
            ArticleStatus::Failed => "failed",
        }
    }
}

#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Article status that mirrors a job leaving the runner in this status.
    pub fn article_status(&self) -> ArticleStatus {
        match self {
            JobStatus::Queued => ArticleStatus::Queued,
            JobStatus::Processing => ArticleStatus::Processing,
            JobStatus::Done => ArticleStatus::Done,
            JobStatus::Failed => ArticleStatus::Failed,
        }
    }
}

/// Tag persisted next to every failure message.
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    ExtractionTooShort,
    GenerationEmpty,
    GenerationSchema,
    GenerationUrlMismatch,
    Generation,
    UnsupportedJobType,
    InvalidPayload,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fetch => "fetch",
            ErrorKind::ExtractionTooShort => "extraction_too_short",
            ErrorKind::GenerationEmpty => "generation_empty",
            ErrorKind::GenerationSchema => "generation_schema",
            ErrorKind::GenerationUrlMismatch => "generation_url_mismatch",
            ErrorKind::Generation => "generation",
            ErrorKind::UnsupportedJobType => "unsupported_job_type",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// --- Tables ---

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub pw_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Source {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub label: Option<String>,
    pub kind: SourceKind, // fixed at creation
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Article {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_id: Option<Uuid>,
    pub url: String,
    pub status: ArticleStatus,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub raw_html: Option<String>,
    pub extracted_text: Option<String>,
    pub title_en: Option<String>,
    pub title_ge: Option<String>,
    pub brief_en: Option<String>,
    pub brief_ge: Option<String>,
    pub article_en: Option<String>,
    pub article_ge: Option<String>,
    pub structured_output: Option<serde_json::Value>, // raw generator payload
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// English title, then Georgian title, then a placeholder.
    pub fn display_title(&self) -> &str {
        self.title_en
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.title_ge.as_deref().filter(|t| !t.is_empty()))
            .unwrap_or("Untitled")
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,               // job type, e.g. "process_url"
    pub payload: serde_json::Value, // job data as JSONB
    pub status: JobStatus,
    pub attempts: i32, // monotonic for the life of the row
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
