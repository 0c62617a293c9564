use crate::entities::{Source, SourceKind};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSource {
    pub url: String,
    pub label: Option<String>,
    pub kind: SourceKind,
}

/// Every query is scoped to the owning user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceRepositoryTrait: Send + Sync {
    async fn create(&self, user_id: Uuid, source: NewSource) -> Result<Source>;
    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Source>>;
    /// Active sources, oldest first.
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Source>>;
    async fn find_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<Source>>;
    /// Flip `is_active`; `None` when the source does not belong to the user.
    async fn toggle_active(&self, user_id: Uuid, id: Uuid) -> Result<Option<Source>>;
}

const SOURCE_COLUMNS: &str = "id, user_id, url, label, kind, is_active, created_at";

#[derive(Clone)]
pub struct SourceRepository {
    pool: Pool<Postgres>,
}

impl SourceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceRepositoryTrait for SourceRepository {
    async fn create(&self, user_id: Uuid, source: NewSource) -> Result<Source> {
        let sql = format!(
            "INSERT INTO sources (user_id, url, label, kind) VALUES ($1, $2, $3, $4) RETURNING {SOURCE_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Source>(&sql)
            .bind(user_id)
            .bind(&source.url)
            .bind(&source.label)
            .bind(source.kind)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Source>> {
        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM sources WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let sources = sqlx::query_as::<_, Source>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(sources)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Source>> {
        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM sources WHERE user_id = $1 AND is_active ORDER BY created_at ASC"
        );
        let sources = sqlx::query_as::<_, Source>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(sources)
    }

    async fn find_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<Source>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = $1 AND user_id = $2");
        let source = sqlx::query_as::<_, Source>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(source)
    }

    async fn toggle_active(&self, user_id: Uuid, id: Uuid) -> Result<Option<Source>> {
        let sql = format!(
            "UPDATE sources SET is_active = NOT is_active WHERE id = $1 AND user_id = $2 RETURNING {SOURCE_COLUMNS}"
        );
        let source = sqlx::query_as::<_, Source>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(source)
    }
}
