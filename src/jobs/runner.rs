use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::RunnerSettings;
use crate::entities::{Job, JobStatus};
use crate::jobs::{JobRegistry, JobRepositoryTrait, PipelineError};
use crate::repositories::ArticleRepositoryTrait;

/// Where a failed attempt leaves the job.
pub fn next_status(attempts: i32, max_attempts: i32) -> JobStatus {
    if attempts < max_attempts {
        JobStatus::Queued
    } else {
        JobStatus::Failed
    }
}

/// Summary of one `run_once` invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunReport {
    /// Jobs claimed and run.
    pub attempted: usize,
    /// Jobs that reached `done`.
    pub processed: usize,
    pub requeued: usize,
    pub failed: usize,
    /// Jobs another invocation claimed first.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Skipped,
    Done,
    Requeued,
    Failed,
}

impl RunReport {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Done => {
                self.attempted += 1;
                self.processed += 1;
            }
            JobOutcome::Requeued => {
                self.attempted += 1;
                self.requeued += 1;
            }
            JobOutcome::Failed => {
                self.attempted += 1;
                self.failed += 1;
            }
        }
    }
}

/// Claims a bounded batch of queued jobs and drives each through its handler.
pub struct JobRunner {
    jobs: Arc<dyn JobRepositoryTrait>,
    articles: Arc<dyn ArticleRepositoryTrait>,
    registry: Arc<JobRegistry>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<dyn JobRepositoryTrait>,
        articles: Arc<dyn ArticleRepositoryTrait>,
        registry: JobRegistry,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            jobs,
            articles,
            registry: Arc::new(registry),
            settings,
        }
    }

    pub fn settings(&self) -> RunnerSettings {
        self.settings
    }

    /// One worker invocation. Only a failure to read the queue itself is an
    /// error; anything that goes wrong with a single job stays with that job.
    pub async fn run_once(&self) -> anyhow::Result<RunReport> {
        let limit = i64::try_from(self.settings.max_batch_size)?;
        let batch = self.jobs.queued_batch(limit).await?;

        if batch.is_empty() {
            return Ok(RunReport::default());
        }
        info!(jobs = batch.len(), "starting worker run");

        let outcomes: Vec<JobOutcome> = stream::iter(batch)
            .map(|job| self.run_job(job))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let report = outcomes.into_iter().fold(RunReport::default(), |mut report, outcome| {
            report.record(outcome);
            report
        });
        info!(
            attempted = report.attempted,
            processed = report.processed,
            requeued = report.requeued,
            failed = report.failed,
            skipped = report.skipped,
            "worker run finished"
        );
        Ok(report)
    }

    async fn run_job(&self, queued: Job) -> JobOutcome {
        let job = match self.jobs.claim(queued.id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id = %queued.id, "job already claimed, skipping");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                error!(job_id = %queued.id, error = %e, "failed to claim job");
                return JobOutcome::Skipped;
            }
        };

        let span = info_span!("job", id = %job.id, kind = %job.kind, attempt = job.attempts);
        self.process_claimed(job).instrument(span).await
    }

    async fn process_claimed(&self, job: Job) -> JobOutcome {
        let result = match self.registry.handler_for(&job.kind) {
            Ok(handler) => handler.run(&job).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => match self.jobs.mark_done(job.id).await {
                Ok(()) => {
                    info!("job completed");
                    JobOutcome::Done
                }
                Err(e) => {
                    error!(error = %e, "failed to mark job done");
                    self.record_failure(&job, &PipelineError::Persistence(e)).await
                }
            },
            Err(e) => self.record_failure(&job, &e).await,
        }
    }

    async fn record_failure(&self, job: &Job, err: &PipelineError) -> JobOutcome {
        let status = next_status(job.attempts, self.settings.max_attempts);
        let message = err.to_string();
        let kind = err.kind();

        warn!(
            error = %message,
            error_kind = kind.as_str(),
            next = ?status,
            "job attempt failed"
        );

        if let Err(e) = self.jobs.mark_failure(job.id, status, &message, kind).await {
            error!(error = %e, "failed to record job failure");
        }

        if let Some(article_id) = article_id_of(job) {
            if let Err(e) = self
                .articles
                .record_failure(article_id, status.article_status(), &message, kind)
                .await
            {
                error!(%article_id, error = %e, "failed to record article failure");
            }
        }

        match status {
            JobStatus::Failed => JobOutcome::Failed,
            _ => JobOutcome::Requeued,
        }
    }
}

/// Jobs that concern an article name it in their payload.
fn article_id_of(job: &Job) -> Option<Uuid> {
    job.payload
        .get("article_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Article, ArticleStatus, ErrorKind};
    use crate::extractor::{ExtractedText, TextExtractor};
    use crate::fetcher::{ContentFetcher, FetchError, PageResponse};
    use crate::generator::{ArticleGenerator, GeneratedArticle, GenerationError};
    use crate::jobs::{MockJobRepositoryTrait, PROCESS_URL, ProcessUrlHandler, ProcessUrlPayload};
    use crate::repositories::{MemoryStore, MockArticleRepositoryTrait};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use url::Url;

    /// Serves a long page for every URL, except those listed as failing.
    #[derive(Default)]
    struct RecordingFetcher {
        calls: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl ContentFetcher for RecordingFetcher {
        async fn fetch_page(&self, url: &str) -> Result<PageResponse, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.failing.contains(url) {
                return Err(FetchError::Http {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    retriable: true,
                });
            }
            Ok(PageResponse::from_html(Url::parse(url).unwrap(), "a".repeat(300)))
        }
    }

    /// Treats the page body as the article text.
    struct PassthroughExtractor;

    impl TextExtractor for PassthroughExtractor {
        fn extract(&self, html: &str, _url: &Url) -> ExtractedText {
            ExtractedText {
                title: None,
                text: html.to_string(),
            }
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl ArticleGenerator for EchoGenerator {
        async fn generate(&self, _text: &str, url: &str) -> Result<GeneratedArticle, GenerationError> {
            Ok(GeneratedArticle {
                title_en: format!("About {url}"),
                brief_en: "Brief.".into(),
                article_en: "English body.".into(),
                title_ge: "სათაური".into(),
                brief_ge: "მოკლედ.".into(),
                article_ge: "ქართული ტექსტი.".into(),
                source_url: url.to_string(),
            })
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        fetcher: Arc<RecordingFetcher>,
        runner: JobRunner,
    }

    fn harness(failing: &[&str], settings: RunnerSettings) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(RecordingFetcher {
            calls: Mutex::new(Vec::new()),
            failing: failing.iter().map(|s| s.to_string()).collect(),
        });

        let mut registry = JobRegistry::new();
        registry.register(ProcessUrlHandler::new(
            store.clone(),
            fetcher.clone(),
            Arc::new(PassthroughExtractor),
            Arc::new(EchoGenerator),
            settings.min_extracted_chars,
        ));

        let runner = JobRunner::new(store.clone(), store.clone(), registry, settings);
        Harness {
            store,
            fetcher,
            runner,
        }
    }

    async fn enqueue(store: &MemoryStore, url: &str) -> (Article, Job) {
        let user = Uuid::nil();
        let article = store.create_queued(user, None, url).await.unwrap();
        let payload = ProcessUrlPayload {
            article_id: article.id,
            url: url.to_string(),
            force: None,
        };
        let job = store
            .enqueue(user, PROCESS_URL, serde_json::to_value(payload).unwrap())
            .await
            .unwrap();
        (article, job)
    }

    async fn job(store: &MemoryStore, id: Uuid) -> Job {
        JobRepositoryTrait::find(store, id).await.unwrap().unwrap()
    }

    async fn article(store: &MemoryStore, id: Uuid) -> Article {
        ArticleRepositoryTrait::find(store, id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn processes_oldest_first() {
        let urls = ["https://x/1", "https://x/2", "https://x/3"];
        let h = harness(&[], RunnerSettings::default());
        for url in urls {
            enqueue(&h.store, url).await;
        }

        let report = h.runner.run_once().await.unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(*h.fetcher.calls.lock().unwrap(), urls);
    }

    #[tokio::test]
    async fn attempts_at_most_batch_size() {
        let h = harness(&[], RunnerSettings::default());
        let mut jobs = Vec::new();
        for i in 0..5 {
            jobs.push(enqueue(&h.store, &format!("https://x/{i}")).await.1);
        }

        let report = h.runner.run_once().await.unwrap();

        assert_eq!(report.attempted, 3);
        for queued in &jobs[3..] {
            let stored = job(&h.store, queued.id).await;
            assert_eq!(stored.status, JobStatus::Queued);
            assert_eq!(stored.attempts, 0);
        }
    }

    #[tokio::test]
    async fn failing_job_exhausts_retry_budget() {
        let url = "https://x/broken";
        let h = harness(&[url], RunnerSettings::default());
        let (queued_article, queued_job) = enqueue(&h.store, url).await;

        let expected = [
            (1, JobStatus::Queued, ArticleStatus::Queued),
            (2, JobStatus::Queued, ArticleStatus::Queued),
            (3, JobStatus::Failed, ArticleStatus::Failed),
        ];
        for (attempts, job_status, article_status) in expected {
            h.runner.run_once().await.unwrap();

            let stored_job = job(&h.store, queued_job.id).await;
            assert_eq!(stored_job.attempts, attempts);
            assert_eq!(stored_job.status, job_status);
            assert_eq!(stored_job.last_error_kind, Some(ErrorKind::Fetch));
            assert!(stored_job.last_error.unwrap().starts_with("Failed to fetch URL: 502"));

            let stored_article = article(&h.store, queued_article.id).await;
            assert_eq!(stored_article.status, article_status);
            assert!(stored_article.error.is_some());
        }

        let report = h.runner.run_once().await.unwrap();
        assert_eq!(report, RunReport::default());
        assert_eq!(h.fetcher.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn success_marks_job_and_article_done() {
        let h = harness(&[], RunnerSettings::default());
        let (queued_article, queued_job) = enqueue(&h.store, "https://x/ok").await;

        let report = h.runner.run_once().await.unwrap();
        assert_eq!(report.processed, 1);

        let stored_job = job(&h.store, queued_job.id).await;
        assert_eq!(stored_job.status, JobStatus::Done);
        assert!(stored_job.last_error.is_none());

        let stored = article(&h.store, queued_article.id).await;
        assert_eq!(stored.status, ArticleStatus::Done);
        assert!(stored.error.is_none());
        for field in [
            &stored.title_en,
            &stored.title_ge,
            &stored.brief_en,
            &stored.brief_ge,
            &stored.article_en,
            &stored.article_ge,
        ] {
            assert!(field.as_deref().is_some_and(|f| !f.is_empty()));
        }
        assert!(stored.structured_output.is_some());
    }

    #[tokio::test]
    async fn short_text_fails_the_quality_gate() {
        let settings = RunnerSettings {
            min_extracted_chars: 301,
            max_attempts: 1,
            ..RunnerSettings::default()
        };
        let h = harness(&[], settings);
        let (queued_article, _) = enqueue(&h.store, "https://x/short").await;

        let report = h.runner.run_once().await.unwrap();
        assert_eq!(report.failed, 1);

        let stored = article(&h.store, queued_article.id).await;
        assert_eq!(stored.status, ArticleStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("Extracted text is too short"));
        assert_eq!(stored.error_kind, Some(ErrorKind::ExtractionTooShort));
        assert!(stored.title_en.is_none());
    }

    #[tokio::test]
    async fn one_failing_job_does_not_stop_the_batch() {
        let h = harness(&["https://x/bad"], RunnerSettings::default());
        let (_, bad) = enqueue(&h.store, "https://x/bad").await;
        let (_, good) = enqueue(&h.store, "https://x/good").await;

        let report = h.runner.run_once().await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.processed, 1);
        assert_eq!(report.requeued, 1);
        assert_eq!(job(&h.store, bad.id).await.status, JobStatus::Queued);
        assert_eq!(job(&h.store, good.id).await.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn unknown_job_type_consumes_attempts() {
        let settings = RunnerSettings {
            max_attempts: 2,
            ..RunnerSettings::default()
        };
        let h = harness(&[], settings);
        let queued = h
            .store
            .enqueue(Uuid::nil(), "send_newsletter", json!({}))
            .await
            .unwrap();

        h.runner.run_once().await.unwrap();
        let first = job(&h.store, queued.id).await;
        assert_eq!((first.status, first.attempts), (JobStatus::Queued, 1));
        assert_eq!(first.last_error_kind, Some(ErrorKind::UnsupportedJobType));

        h.runner.run_once().await.unwrap();
        let second = job(&h.store, queued.id).await;
        assert_eq!((second.status, second.attempts), (JobStatus::Failed, 2));
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let h = harness(&[], RunnerSettings::default());
        assert_eq!(h.runner.run_once().await.unwrap(), RunReport::default());
    }

    #[tokio::test]
    async fn lost_claim_is_skipped_not_attempted() {
        let queued = Job {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            kind: PROCESS_URL.to_string(),
            payload: json!({}),
            status: JobStatus::Queued,
            attempts: 0,
            last_error: None,
            last_error_kind: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let mut jobs = MockJobRepositoryTrait::new();
        let batch = vec![queued.clone()];
        jobs.expect_queued_batch()
            .withf(|limit| *limit == 3)
            .returning(move |_| Ok(batch.clone()));
        jobs.expect_claim().times(1).returning(|_| Ok(None));
        jobs.expect_mark_done().times(0);
        jobs.expect_mark_failure().times(0);

        let mut articles = MockArticleRepositoryTrait::new();
        articles.expect_record_failure().times(0);

        let runner = JobRunner::new(
            Arc::new(jobs),
            Arc::new(articles),
            JobRegistry::new(),
            RunnerSettings::default(),
        );
        let report = runner.run_once().await.unwrap();

        assert_eq!(
            report,
            RunReport {
                skipped: 1,
                ..RunReport::default()
            }
        );
    }

    #[tokio::test]
    async fn unrecorded_success_is_requeued_not_counted() {
        let store = Arc::new(MemoryStore::new());
        let (article, queued) = enqueue(&store, "https://x/done-but-lost").await;

        let mut jobs = MockJobRepositoryTrait::new();
        let batch = vec![queued.clone()];
        jobs.expect_queued_batch().returning(move |_| Ok(batch.clone()));
        let claimed = Job {
            status: JobStatus::Processing,
            attempts: 1,
            ..queued.clone()
        };
        jobs.expect_claim().returning(move |_| Ok(Some(claimed.clone())));
        jobs.expect_mark_done()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        jobs.expect_mark_failure()
            .withf(|_, status, _, kind| {
                *status == JobStatus::Queued && *kind == ErrorKind::Persistence
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut registry = JobRegistry::new();
        registry.register(ProcessUrlHandler::new(
            store.clone(),
            Arc::new(RecordingFetcher::default()),
            Arc::new(PassthroughExtractor),
            Arc::new(EchoGenerator),
            RunnerSettings::default().min_extracted_chars,
        ));
        let runner = JobRunner::new(Arc::new(jobs), store.clone(), registry, RunnerSettings::default());

        let report = runner.run_once().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.requeued, 1);

        let stored = self::article(&store, article.id).await;
        assert_eq!(stored.status, ArticleStatus::Queued);
        assert_eq!(stored.error_kind, Some(ErrorKind::Persistence));
    }

    #[tokio::test]
    async fn queue_read_failure_is_an_error() {
        let mut jobs = MockJobRepositoryTrait::new();
        jobs.expect_queued_batch()
            .returning(|_| Err(anyhow::anyhow!("database is down")));

        let runner = JobRunner::new(
            Arc::new(jobs),
            Arc::new(MockArticleRepositoryTrait::new()),
            JobRegistry::new(),
            RunnerSettings::default(),
        );
        assert!(runner.run_once().await.is_err());
    }

    #[tokio::test]
    async fn bounded_pool_still_processes_everything() {
        let settings = RunnerSettings {
            concurrency: 3,
            max_batch_size: 6,
            ..RunnerSettings::default()
        };
        let h = harness(&[], settings);
        for i in 0..6 {
            enqueue(&h.store, &format!("https://x/{i}")).await;
        }

        let report = h.runner.run_once().await.unwrap();
        assert_eq!(report.processed, 6);
        assert!(
            h.store
                .jobs()
                .await
                .iter()
                .all(|j| j.status == JobStatus::Done && j.attempts == 1)
        );
    }

    #[test]
    fn next_status_examples() {
        assert_eq!(next_status(1, 3), JobStatus::Queued);
        assert_eq!(next_status(2, 3), JobStatus::Queued);
        assert_eq!(next_status(3, 3), JobStatus::Failed);
        assert_eq!(next_status(1, 1), JobStatus::Failed);
    }

    proptest! {
        #[test]
        fn next_status_fails_exactly_when_budget_is_spent(attempts in 1i32..50, max in 1i32..50) {
            let status = next_status(attempts, max);
            prop_assert_eq!(status == JobStatus::Failed, attempts >= max);
            prop_assert!(matches!(status, JobStatus::Queued | JobStatus::Failed));
        }
    }
}
