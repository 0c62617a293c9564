use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::RunnerSettings;
use crate::entities::{Source, SourceKind};
use crate::feeds::FeedReader;
use crate::jobs::{JobRepositoryTrait, PROCESS_URL, ProcessUrlPayload};
use crate::repositories::{ArticleRepositoryTrait, SourceRepositoryTrait};

pub const SOURCE_NOT_FOUND: &str = "Source not found";

/// Result of running one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSourceOutcome {
    pub queued: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

impl RunSourceOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Totals over every active source of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunAllOutcome {
    pub sources: usize,
    pub queued: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Turns sources into queued articles and `process_url` jobs.
///
/// It never runs jobs: processing is left to the worker endpoint.
pub struct SourceRunner {
    sources: Arc<dyn SourceRepositoryTrait>,
    articles: Arc<dyn ArticleRepositoryTrait>,
    jobs: Arc<dyn JobRepositoryTrait>,
    feeds: Arc<dyn FeedReader>,
    settings: RunnerSettings,
}

impl SourceRunner {
    pub fn new(
        sources: Arc<dyn SourceRepositoryTrait>,
        articles: Arc<dyn ArticleRepositoryTrait>,
        jobs: Arc<dyn JobRepositoryTrait>,
        feeds: Arc<dyn FeedReader>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            sources,
            articles,
            jobs,
            feeds,
            settings,
        }
    }

    /// Missing sources and unreadable feeds are reported in the outcome;
    /// only store failures are errors.
    #[instrument(skip(self))]
    pub async fn run(&self, owner: Uuid, source_id: Uuid) -> Result<RunSourceOutcome> {
        let Some(source) = self.sources.find_for_user(owner, source_id).await? else {
            return Ok(RunSourceOutcome::failed(SOURCE_NOT_FOUND));
        };
        self.run_source(owner, &source).await
    }

    /// Run every active source of `owner`, oldest first.
    #[instrument(skip(self))]
    pub async fn run_all(&self, owner: Uuid) -> Result<RunAllOutcome> {
        let sources = self.sources.list_active(owner).await?;
        let mut total = RunAllOutcome::default();

        for source in &sources {
            let outcome = self.run_source(owner, source).await?;
            total.sources += 1;
            total.queued += outcome.queued;
            total.skipped += outcome.skipped;
            if let Some(error) = outcome.error {
                total.errors.push(format!("{}: {error}", source.display_name()));
            }
        }

        info!(
            sources = total.sources,
            queued = total.queued,
            skipped = total.skipped,
            "ran active sources"
        );
        Ok(total)
    }

    async fn run_source(&self, owner: Uuid, source: &Source) -> Result<RunSourceOutcome> {
        let candidates = match source.kind {
            SourceKind::Single => vec![source.url.clone()],
            SourceKind::Feed => {
                match self
                    .feeds
                    .recent_items(&source.url, self.settings.feed_item_limit)
                    .await
                {
                    Ok(items) => items.into_iter().map(|item| item.link).collect(),
                    Err(e) => {
                        warn!(source_id = %source.id, error = %e, "feed retrieval failed");
                        return Ok(RunSourceOutcome::failed(e.to_string()));
                    }
                }
            }
        };

        let mut outcome = RunSourceOutcome::default();
        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(candidates.len());
        for url in candidates {
            let url = url.trim().to_string();
            if url.is_empty() {
                continue;
            }
            if seen.insert(url.clone()) {
                urls.push(url);
            } else {
                outcome.skipped += 1;
            }
        }

        let existing = self.articles.existing_urls(owner, &urls).await?;

        for url in urls {
            if existing.contains(&url) {
                outcome.skipped += 1;
                continue;
            }
            self.enqueue(owner, source.id, &url).await?;
            outcome.queued += 1;
        }

        info!(
            source_id = %source.id,
            queued = outcome.queued,
            skipped = outcome.skipped,
            "source run finished"
        );
        Ok(outcome)
    }

    async fn enqueue(&self, owner: Uuid, source_id: Uuid, url: &str) -> Result<()> {
        let article = self.articles.create_queued(owner, Some(source_id), url).await?;
        let payload = ProcessUrlPayload {
            article_id: article.id,
            url: url.to_string(),
            force: None,
        };
        self.jobs
            .enqueue(owner, PROCESS_URL, serde_json::to_value(payload)?)
            .await?;
        Ok(())
    }
}
