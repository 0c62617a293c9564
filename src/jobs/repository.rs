use crate::entities::{ErrorKind, Job, JobStatus};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepositoryTrait: Send + Sync {
    /// Enqueue a new job
    async fn enqueue(&self, user_id: Uuid, kind: &str, payload: Value) -> Result<Job>;

    /// Up to `limit` queued jobs, oldest first. Nothing is reserved.
    async fn queued_batch(&self, limit: i64) -> Result<Vec<Job>>;

    /// Compare-and-swap `queued -> processing`, bumping `attempts`.
    /// `None` means another invocation got there first.
    async fn claim(&self, id: Uuid) -> Result<Option<Job>>;

    /// Mark job as done and clear its error
    async fn mark_done(&self, id: Uuid) -> Result<()>;

    /// Record a failed attempt; `status` is `Queued` for a retry or `Failed`.
    async fn mark_failure(&self, id: Uuid, status: JobStatus, error: &str, kind: ErrorKind)
    -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Job>>;
}

const JOB_COLUMNS: &str =
    "id, user_id, kind, payload, status, attempts, last_error, last_error_kind, created_at, updated_at";

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepositoryTrait for JobRepository {
    async fn enqueue(&self, user_id: Uuid, kind: &str, payload: Value) -> Result<Job> {
        let sql = format!(
            "INSERT INTO jobs (user_id, kind, payload) VALUES ($1, $2, $3) RETURNING {JOB_COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(user_id)
            .bind(kind)
            .bind(payload)
            .fetch_one(&self.pool)
            .await?;

        Ok(job)
    }

    async fn queued_batch(&self, limit: i64) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'queued' ORDER BY created_at ASC, id ASC LIMIT $1"
        );
        let jobs = sqlx::query_as::<_, Job>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    async fn claim(&self, id: Uuid) -> Result<Option<Job>> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = 'processing',
                attempts = attempts + 1,
                updated_at = now()
            WHERE id = $1 AND status = 'queued'
            RETURNING {JOB_COLUMNS}
            "#
        );
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn mark_done(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'done',
                last_error = NULL,
                last_error_kind = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failure(
        &self,
        id: Uuid,
        status: JobStatus,
        error: &str,
        kind: ErrorKind,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                last_error = $3,
                last_error_kind = $4,
                updated_at = now()
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

    async fn find(&self, id: Uuid) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }
}
