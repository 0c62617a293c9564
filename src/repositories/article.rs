use crate::entities::{Article, ArticleStatus, ErrorKind};
use crate::generator::GeneratedArticle;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Pool, Postgres};
use std::collections::HashSet;
use uuid::Uuid;

/// Row of the article list page.
#[derive(Debug, Clone, FromRow)]
pub struct ArticleListing {
    pub id: Uuid,
    pub url: String,
    pub status: ArticleStatus,
    pub title_en: Option<String>,
    pub title_ge: Option<String>,
    pub error: Option<String>,
    pub is_used: bool,
    pub source_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ArticleListing {
    pub fn display_title(&self) -> &str {
        self.title_en
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.title_ge.as_deref().filter(|t| !t.is_empty()))
            .unwrap_or(&self.url)
    }
}

/// User-facing methods take the owner; the pipeline methods run with the
/// runner's cross-tenant privilege and key on the article id alone.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleRepositoryTrait: Send + Sync {
    async fn create_queued(&self, user_id: Uuid, source_id: Option<Uuid>, url: &str)
    -> Result<Article>;
    /// Which of `urls` already exist as articles of this user, across all sources.
    async fn existing_urls(&self, user_id: Uuid, urls: &[String]) -> Result<HashSet<String>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ArticleListing>>;
    async fn find_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<Article>>;
    /// Back to `queued` with the error cleared. False when not owned by the user.
    async fn requeue(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
    async fn set_used(&self, user_id: Uuid, id: Uuid, used: bool) -> Result<bool>;

    async fn find(&self, id: Uuid) -> Result<Option<Article>>;
    async fn mark_processing(&self, id: Uuid) -> Result<()>;
    async fn save_checkpoint(&self, id: Uuid, raw_html: &str, extracted_text: &str) -> Result<()>;
    /// Store the generated fields, set `done` and clear the error.
    async fn complete(&self, id: Uuid, generated: &GeneratedArticle, structured: Value)
    -> Result<()>;
    async fn record_failure(
        &self,
        id: Uuid,
        status: ArticleStatus,
        error: &str,
        kind: ErrorKind,
    ) -> Result<()>;
}

const ARTICLE_COLUMNS: &str = "id, user_id, source_id, url, status, error, error_kind, raw_html, \
     extracted_text, title_en, title_ge, brief_en, brief_ge, article_en, article_ge, \
     structured_output, is_used, created_at, updated_at";

#[derive(Clone)]
pub struct ArticleRepository {
    pool: Pool<Postgres>,
}

impl ArticleRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleRepositoryTrait for ArticleRepository {
    async fn create_queued(
        &self,
        user_id: Uuid,
        source_id: Option<Uuid>,
        url: &str,
    ) -> Result<Article> {
        let sql = format!(
            "INSERT INTO articles (user_id, source_id, url, status) VALUES ($1, $2, $3, 'queued') RETURNING {ARTICLE_COLUMNS}"
        );
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(user_id)
            .bind(source_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await?;

        Ok(article)
    }

    async fn existing_urls(&self, user_id: Uuid, urls: &[String]) -> Result<HashSet<String>> {
        if urls.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT url
            FROM articles
            WHERE user_id = $1 AND url = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(urls)
        .fetch_all(&self.pool)
        .await?;

        Ok(found.into_iter().collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ArticleListing>> {
        let rows = sqlx::query_as::<_, ArticleListing>(
            r#"
            SELECT a.id, a.url, a.status, a.title_en, a.title_ge, a.error, a.is_used,
                   COALESCE(s.label, s.url) AS source_label, a.created_at
            FROM articles a
            LEFT JOIN sources s ON s.id = a.source_id
            WHERE a.user_id = $1
            ORDER BY a.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1 AND user_id = $2");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(article)
    }

    async fn requeue(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET status = 'queued', error = NULL, error_kind = NULL, updated_at = now()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_used(&self, user_id: Uuid, id: Uuid, used: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET is_used = $3, updated_at = now() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(used)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(article)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE articles SET status = 'processing', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn save_checkpoint(&self, id: Uuid, raw_html: &str, extracted_text: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET raw_html = $2, extracted_text = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(raw_html)
        .bind(extracted_text)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        generated: &GeneratedArticle,
        structured: Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET title_en = $2, title_ge = $3, brief_en = $4, brief_ge = $5,
                article_en = $6, article_ge = $7, structured_output = $8,
                status = 'done', error = NULL, error_kind = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&generated.title_en)
        .bind(&generated.title_ge)
        .bind(&generated.brief_en)
        .bind(&generated.brief_ge)
        .bind(&generated.article_en)
        .bind(&generated.article_ge)
        .bind(structured)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        status: ArticleStatus,
        error: &str,
        kind: ErrorKind,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET status = $2, error = $3, error_kind = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .bind(kind)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
