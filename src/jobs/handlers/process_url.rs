use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Span, debug, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::entities::{Article, Job};
use crate::extractor::TextExtractor;
use crate::fetcher::ContentFetcher;
use crate::generator::{ArticleGenerator, GenerationError};
use crate::jobs::{JobHandler, PipelineError};
use crate::repositories::ArticleRepositoryTrait;

pub const PROCESS_URL: &str = "process_url";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessUrlPayload {
    pub article_id: Uuid,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

impl ProcessUrlPayload {
    pub fn is_forced(&self) -> bool {
        self.force.unwrap_or(false)
    }
}

/// Fetch, extract, generate and persist one article.
pub struct ProcessUrlHandler {
    articles: Arc<dyn ArticleRepositoryTrait>,
    fetcher: Arc<dyn ContentFetcher>,
    extractor: Arc<dyn TextExtractor>,
    generator: Arc<dyn ArticleGenerator>,
    min_extracted_chars: usize,
}

impl ProcessUrlHandler {
    pub fn new(
        articles: Arc<dyn ArticleRepositoryTrait>,
        fetcher: Arc<dyn ContentFetcher>,
        extractor: Arc<dyn TextExtractor>,
        generator: Arc<dyn ArticleGenerator>,
        min_extracted_chars: usize,
    ) -> Self {
        Self {
            articles,
            fetcher,
            extractor,
            generator,
            min_extracted_chars,
        }
    }

    /// Extracted text saved by an earlier attempt, if it passed the gate.
    fn reusable_checkpoint(&self, article: &Article) -> Option<String> {
        article
            .extracted_text
            .as_ref()
            .filter(|text| text.trim().chars().count() >= self.min_extracted_chars)
            .cloned()
    }

    async fn fetch_and_extract(&self, article_id: Uuid, url: &str) -> Result<String, PipelineError> {
        let page = self.fetcher.fetch_page(url).await.inspect_err(|e| {
            debug!(
                error = %e,
                retriable = e.should_retry(),
                timeout = e.is_timeout(),
                "fetch failed"
            );
        })?;
        let extracted = self.extractor.extract(&page.body_utf8, &page.url_final);

        let chars = extracted.char_len();
        if chars < self.min_extracted_chars {
            return Err(PipelineError::ExtractionTooShort {
                chars,
                min: self.min_extracted_chars,
            });
        }

        self.articles
            .save_checkpoint(article_id, &page.body_utf8, &extracted.text)
            .await?;
        debug!(chars, "saved extraction checkpoint");
        Ok(extracted.text)
    }
}

#[async_trait]
impl JobHandler for ProcessUrlHandler {
    #[instrument(skip(self, job), fields(article_id = tracing::field::Empty, url = tracing::field::Empty))]
    async fn run(&self, job: &Job) -> Result<(), PipelineError> {
        let payload: ProcessUrlPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;

        let span = Span::current();
        span.record("article_id", tracing::field::display(payload.article_id));
        span.record("url", payload.url.as_str());

        Url::parse(&payload.url).map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;

        let article = self
            .articles
            .find(payload.article_id)
            .await?
            .ok_or_else(|| {
                PipelineError::InvalidPayload(format!("article {} not found", payload.article_id))
            })?;

        self.articles.mark_processing(article.id).await?;

        let checkpoint = if payload.is_forced() {
            None
        } else {
            self.reusable_checkpoint(&article)
        };

        let text = match checkpoint {
            Some(text) => {
                info!("reusing extraction checkpoint");
                text
            }
            None => self.fetch_and_extract(article.id, &payload.url).await?,
        };

        let generated = self.generator.generate(&text, &payload.url).await?;
        if generated.source_url != payload.url {
            return Err(GenerationError::UrlMismatch.into());
        }

        let structured = serde_json::to_value(&generated)
            .map_err(|e| PipelineError::Persistence(e.into()))?;
        self.articles.complete(article.id, &generated, structured).await?;

        info!("article generated");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        PROCESS_URL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ArticleStatus, ErrorKind, JobStatus};
    use crate::extractor::{ExtractedText, MockTextExtractor};
    use crate::fetcher::{MockContentFetcher, PageResponse};
    use crate::generator::{GeneratedArticle, MockArticleGenerator};
    use crate::jobs::JobRepositoryTrait;
    use crate::repositories::MemoryStore;
    use serde_json::json;

    const URL: &str = "https://news.example/a";

    fn generated(source_url: &str) -> GeneratedArticle {
        GeneratedArticle {
            title_en: "Title".into(),
            brief_en: "Brief.".into(),
            article_en: "Article.".into(),
            title_ge: "სათაური".into(),
            brief_ge: "მოკლედ.".into(),
            article_ge: "სტატია.".into(),
            source_url: source_url.into(),
        }
    }

    fn page_fetcher(times: usize) -> MockContentFetcher {
        let mut fetcher = MockContentFetcher::new();
        fetcher.expect_fetch_page().times(times).returning(|url| {
            Ok(PageResponse::from_html(
                Url::parse(url).unwrap(),
                "<html><body>story</body></html>",
            ))
        });
        fetcher
    }

    fn extractor_returning(text: String, times: usize) -> MockTextExtractor {
        let mut extractor = MockTextExtractor::new();
        extractor.expect_extract().times(times).returning(move |_, _| ExtractedText {
            title: None,
            text: text.clone(),
        });
        extractor
    }

    async fn setup(store: &Arc<MemoryStore>, force: bool) -> (Article, Job) {
        let user = Uuid::new_v4();
        let article = store.create_queued(user, None, URL).await.unwrap();
        let payload = ProcessUrlPayload {
            article_id: article.id,
            url: URL.to_string(),
            force: force.then_some(true),
        };
        let job = store
            .enqueue(user, PROCESS_URL, serde_json::to_value(payload).unwrap())
            .await
            .unwrap();
        (article, job)
    }

    fn handler(
        store: &Arc<MemoryStore>,
        fetcher: MockContentFetcher,
        extractor: MockTextExtractor,
        generator: MockArticleGenerator,
    ) -> ProcessUrlHandler {
        ProcessUrlHandler::new(
            store.clone(),
            Arc::new(fetcher),
            Arc::new(extractor),
            Arc::new(generator),
            200,
        )
    }

    #[tokio::test]
    async fn success_persists_checkpoint_and_generated_fields() {
        let store = Arc::new(MemoryStore::new());
        let (article, job) = setup(&store, false).await;

        let mut generator = MockArticleGenerator::new();
        generator
            .expect_generate()
            .withf(|_, url| url == URL)
            .times(1)
            .returning(|_, url| Ok(generated(url)));

        let handler = handler(&store, page_fetcher(1), extractor_returning("x".repeat(250), 1), generator);
        handler.run(&job).await.unwrap();

        let stored = ArticleRepositoryTrait::find(store.as_ref(), article.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ArticleStatus::Done);
        assert_eq!(stored.extracted_text.as_deref().map(str::len), Some(250));
        assert!(stored.raw_html.is_some());
        assert_eq!(stored.article_ge.as_deref(), Some("სტატია."));
        assert_eq!(stored.structured_output.unwrap()["source_url"], json!(URL));
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn short_text_never_reaches_generation() {
        let store = Arc::new(MemoryStore::new());
        let (article, job) = setup(&store, false).await;

        let mut generator = MockArticleGenerator::new();
        generator.expect_generate().times(0);

        let handler = handler(&store, page_fetcher(1), extractor_returning("y".repeat(150), 1), generator);
        let err = handler.run(&job).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExtractionTooShort);
        let stored = ArticleRepositoryTrait::find(store.as_ref(), article.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.extracted_text.is_none());
    }

    #[tokio::test]
    async fn mismatched_source_url_is_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let (article, job) = setup(&store, false).await;

        let mut generator = MockArticleGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, _| Ok(generated("https://other.example/b")));

        let handler = handler(&store, page_fetcher(1), extractor_returning("z".repeat(300), 1), generator);
        let err = handler.run(&job).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GenerationUrlMismatch);
        let stored = ArticleRepositoryTrait::find(store.as_ref(), article.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.title_en.is_none());
        assert!(stored.structured_output.is_none());
        assert_ne!(stored.status, ArticleStatus::Done);
    }

    #[tokio::test]
    async fn normal_job_reuses_checkpoint_without_fetching() {
        let store = Arc::new(MemoryStore::new());
        let (article, job) = setup(&store, false).await;
        store
            .save_checkpoint(article.id, "<html/>", &"c".repeat(400))
            .await
            .unwrap();

        let mut generator = MockArticleGenerator::new();
        generator
            .expect_generate()
            .withf(|text, _| text.len() == 400)
            .times(1)
            .returning(|_, url| Ok(generated(url)));

        let handler = handler(&store, page_fetcher(0), extractor_returning(String::new(), 0), generator);
        handler.run(&job).await.unwrap();
    }

    #[tokio::test]
    async fn forced_job_refetches_despite_checkpoint() {
        let store = Arc::new(MemoryStore::new());
        let (article, job) = setup(&store, true).await;
        store
            .save_checkpoint(article.id, "<html/>", &"c".repeat(400))
            .await
            .unwrap();

        let mut generator = MockArticleGenerator::new();
        generator
            .expect_generate()
            .withf(|text, _| text.starts_with('f'))
            .times(1)
            .returning(|_, url| Ok(generated(url)));

        let handler = handler(&store, page_fetcher(1), extractor_returning("f".repeat(220), 1), generator);
        handler.run(&job).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_payload_is_invalid_payload() {
        let store = Arc::new(MemoryStore::new());
        let job = store
            .enqueue(Uuid::new_v4(), PROCESS_URL, json!({ "url": 42 }))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let handler = handler(
            &store,
            page_fetcher(0),
            extractor_returning(String::new(), 0),
            MockArticleGenerator::new(),
        );
        let err = handler.run(&job).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
    }

    #[test]
    fn payload_wire_format() {
        let id = Uuid::nil();
        let payload: ProcessUrlPayload =
            serde_json::from_value(json!({ "article_id": id, "url": URL })).unwrap();
        assert!(!payload.is_forced());

        let forced = ProcessUrlPayload {
            force: Some(true),
            ..payload
        };
        assert_eq!(
            serde_json::to_value(&forced).unwrap(),
            json!({ "article_id": id, "url": URL, "force": true })
        );
    }
}
