//! In-process store backing every repository trait.
//!
//! Used by the test suites and for running the pipeline without Postgres.
//! Timestamps handed out by one store are strictly increasing, so ordering by
//! `created_at` is always well defined.

use crate::entities::{Article, ArticleStatus, ErrorKind, Job, JobStatus, Source, User};
use crate::generator::GeneratedArticle;
use crate::jobs::JobRepositoryTrait;
use crate::repositories::{
    ArticleListing, ArticleRepositoryTrait, NewSource, SourceRepositoryTrait, UserRepositoryTrait,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: Vec<User>,
    sources: Vec<Source>,
    articles: Vec<Article>,
    jobs: Vec<Job>,
    last_stamp: Option<DateTime<Utc>>,
}

impl State {
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_stamp {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(next);
        next
    }

    fn article_mut(&mut self, id: Uuid) -> Option<&mut Article> {
        self.articles.iter_mut().find(|a| a.id == id)
    }

    fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All jobs in insertion order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.state.lock().await.jobs.clone()
    }

    /// All articles in insertion order.
    pub async fn articles(&self) -> Vec<Article> {
        self.state.lock().await.articles.clone()
    }

    /// Overwrite a stored article, e.g. to seed a checkpoint.
    pub async fn put_article(&self, article: Article) {
        let mut state = self.state.lock().await;
        match state.articles.iter_mut().find(|a| a.id == article.id) {
            Some(existing) => *existing = article,
            None => state.articles.push(article),
        }
    }
}

#[async_trait]
impl UserRepositoryTrait for MemoryStore {
    async fn create(&self, email: &str, pw_hash: &str) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == email) {
            bail!("duplicate key value violates unique constraint \"users_email_key\"");
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            pw_hash: pw_hash.to_string(),
            created_at: state.stamp(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_password(&self, id: Uuid, pw_hash: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.pw_hash = pw_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SourceRepositoryTrait for MemoryStore {
    async fn create(&self, user_id: Uuid, source: NewSource) -> Result<Source> {
        let mut state = self.state.lock().await;
        let created = Source {
            id: Uuid::new_v4(),
            user_id,
            url: source.url,
            label: source.label,
            kind: source.kind,
            is_active: true,
            created_at: state.stamp(),
        };
        state.sources.push(created.clone());
        Ok(created)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Source>> {
        let state = self.state.lock().await;
        let mut sources: Vec<Source> = state
            .sources
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sources)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Source>> {
        let state = self.state.lock().await;
        Ok(state
            .sources
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect())
    }

    async fn find_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<Source>> {
        let state = self.state.lock().await;
        Ok(state
            .sources
            .iter()
            .find(|s| s.id == id && s.user_id == user_id)
            .cloned())
    }

    async fn toggle_active(&self, user_id: Uuid, id: Uuid) -> Result<Option<Source>> {
        let mut state = self.state.lock().await;
        Ok(state
            .sources
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user_id)
            .map(|s| {
                s.is_active = !s.is_active;
                s.clone()
            }))
    }
}

#[async_trait]
impl ArticleRepositoryTrait for MemoryStore {
    async fn create_queued(
        &self,
        user_id: Uuid,
        source_id: Option<Uuid>,
        url: &str,
    ) -> Result<Article> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        let article = Article {
            id: Uuid::new_v4(),
            user_id,
            source_id,
            url: url.to_string(),
            status: ArticleStatus::Queued,
            error: None,
            error_kind: None,
            raw_html: None,
            extracted_text: None,
            title_en: None,
            title_ge: None,
            brief_en: None,
            brief_ge: None,
            article_en: None,
            article_ge: None,
            structured_output: None,
            is_used: false,
            created_at: now,
            updated_at: now,
        };
        state.articles.push(article.clone());
        Ok(article)
    }

    async fn existing_urls(&self, user_id: Uuid, urls: &[String]) -> Result<HashSet<String>> {
        let state = self.state.lock().await;
        Ok(state
            .articles
            .iter()
            .filter(|a| a.user_id == user_id && urls.contains(&a.url))
            .map(|a| a.url.clone())
            .collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ArticleListing>> {
        let state = self.state.lock().await;
        let mut rows: Vec<ArticleListing> = state
            .articles
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| ArticleListing {
                id: a.id,
                url: a.url.clone(),
                status: a.status,
                title_en: a.title_en.clone(),
                title_ge: a.title_ge.clone(),
                error: a.error.clone(),
                is_used: a.is_used,
                source_label: a.source_id.and_then(|sid| {
                    state
                        .sources
                        .iter()
                        .find(|s| s.id == sid)
                        .map(|s| s.display_name().to_string())
                }),
                created_at: a.created_at,
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<Article>> {
        let state = self.state.lock().await;
        Ok(state
            .articles
            .iter()
            .find(|a| a.id == id && a.user_id == user_id)
            .cloned())
    }

    async fn requeue(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        match state.article_mut(id).filter(|a| a.user_id == user_id) {
            Some(article) => {
                article.status = ArticleStatus::Queued;
                article.error = None;
                article.error_kind = None;
                article.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.articles.len();
        state
            .articles
            .retain(|a| !(a.id == id && a.user_id == user_id));
        Ok(state.articles.len() < before)
    }

    async fn set_used(&self, user_id: Uuid, id: Uuid, used: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        match state.article_mut(id).filter(|a| a.user_id == user_id) {
            Some(article) => {
                article.is_used = used;
                article.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, id: Uuid) -> Result<Option<Article>> {
        let state = self.state.lock().await;
        Ok(state.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        if let Some(article) = state.article_mut(id) {
            article.status = ArticleStatus::Processing;
            article.updated_at = now;
        }
        Ok(())
    }

    async fn save_checkpoint(&self, id: Uuid, raw_html: &str, extracted_text: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        if let Some(article) = state.article_mut(id) {
            article.raw_html = Some(raw_html.to_string());
            article.extracted_text = Some(extracted_text.to_string());
            article.updated_at = now;
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        generated: &GeneratedArticle,
        structured: Value,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        if let Some(article) = state.article_mut(id) {
            article.title_en = Some(generated.title_en.clone());
            article.title_ge = Some(generated.title_ge.clone());
            article.brief_en = Some(generated.brief_en.clone());
            article.brief_ge = Some(generated.brief_ge.clone());
            article.article_en = Some(generated.article_en.clone());
            article.article_ge = Some(generated.article_ge.clone());
            article.structured_output = Some(structured);
            article.status = ArticleStatus::Done;
            article.error = None;
            article.error_kind = None;
            article.updated_at = now;
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        status: ArticleStatus,
        error: &str,
        kind: ErrorKind,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        if let Some(article) = state.article_mut(id) {
            article.status = status;
            article.error = Some(error.to_string());
            article.error_kind = Some(kind);
            article.updated_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepositoryTrait for MemoryStore {
    async fn enqueue(&self, user_id: Uuid, kind: &str, payload: Value) -> Result<Job> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        let job = Job {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.to_string(),
            payload,
            status: JobStatus::Queued,
            attempts: 0,
            last_error: None,
            last_error_kind: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn queued_batch(&self, limit: i64) -> Result<Vec<Job>> {
        let state = self.state.lock().await;
        let mut queued: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(|j| j.created_at);
        queued.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(queued)
    }

    async fn claim(&self, id: Uuid) -> Result<Option<Job>> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        Ok(state
            .job_mut(id)
            .filter(|j| j.status == JobStatus::Queued)
            .map(|job| {
                job.status = JobStatus::Processing;
                job.attempts += 1;
                job.updated_at = now;
                job.clone()
            }))
    }

    async fn mark_done(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        if let Some(job) = state.job_mut(id) {
            job.status = JobStatus::Done;
            job.last_error = None;
            job.last_error_kind = None;
            job.updated_at = now;
        }
        Ok(())
    }

    async fn mark_failure(
        &self,
        id: Uuid,
        status: JobStatus,
        error: &str,
        kind: ErrorKind,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = state.stamp();
        if let Some(job) = state.job_mut(id) {
            job.status = status;
            job.last_error = Some(error.to_string());
            job.last_error_kind = Some(kind);
            job.updated_at = now;
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Job>> {
        let state = self.state.lock().await;
        Ok(state.jobs.iter().find(|j| j.id == id).cloned())
    }
}
