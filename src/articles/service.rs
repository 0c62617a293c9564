use anyhow::Result;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::Article;
use crate::jobs::{JobRepositoryTrait, PROCESS_URL, ProcessUrlPayload};
use crate::repositories::{ArticleListing, ArticleRepositoryTrait};

/// User actions on articles. Every call is scoped to the owner.
#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticleRepositoryTrait>,
    jobs: Arc<dyn JobRepositoryTrait>,
}

impl ArticleService {
    pub fn new(articles: Arc<dyn ArticleRepositoryTrait>, jobs: Arc<dyn JobRepositoryTrait>) -> Self {
        Self { articles, jobs }
    }

    pub async fn list(&self, owner: Uuid) -> Result<Vec<ArticleListing>> {
        self.articles.list_for_user(owner).await
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<Article>> {
        self.articles.find_for_user(owner, id).await
    }

    /// Queue the article again behind a fresh forced job, so it gets a new
    /// attempt budget and re-fetches the page.
    #[instrument(skip(self))]
    pub async fn rerun(&self, owner: Uuid, id: Uuid) -> Result<bool> {
        let Some(article) = self.articles.find_for_user(owner, id).await? else {
            return Ok(false);
        };
        if !self.articles.requeue(owner, id).await? {
            return Ok(false);
        }

        let payload = ProcessUrlPayload {
            article_id: article.id,
            url: article.url,
            force: Some(true),
        };
        let job = self
            .jobs
            .enqueue(owner, PROCESS_URL, serde_json::to_value(payload)?)
            .await?;
        info!(job_id = %job.id, "article re-queued");
        Ok(true)
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool> {
        self.articles.delete(owner, id).await
    }

    pub async fn set_used(&self, owner: Uuid, id: Uuid, used: bool) -> Result<bool> {
        self.articles.set_used(owner, id, used).await
    }
}
