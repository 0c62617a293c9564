use anyhow::{Context, Result};
use axum::extract::FromRef;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::articles::ArticleService;
use crate::auth::jwt::JwtService;
use crate::config::{Config, RunnerSettings};
use crate::extractor::{ReadabilityExtractor, TextExtractor};
use crate::feeds::{FeedReader, HttpFeedReader};
use crate::fetcher::{ContentFetcher, FetcherSettings, HttpFetcher};
use crate::generator::{ArticleGenerator, OpenAiGenerator, OpenAiSettings};
use crate::jobs::{JobRegistry, JobRepository, JobRepositoryTrait, JobRunner, ProcessUrlHandler};
use crate::passwords::Passwords;
use crate::repositories::{
    ArticleRepository, ArticleRepositoryTrait, MemoryStore, SourceRepository,
    SourceRepositoryTrait, UserRepository, UserRepositoryTrait,
};
use crate::sources::SourceRunner;

/// The four stores behind the application.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepositoryTrait>,
    pub sources: Arc<dyn SourceRepositoryTrait>,
    pub articles: Arc<dyn ArticleRepositoryTrait>,
    pub jobs: Arc<dyn JobRepositoryTrait>,
}

impl Stores {
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            sources: Arc::new(SourceRepository::new(pool.clone())),
            articles: Arc::new(ArticleRepository::new(pool.clone())),
            jobs: Arc::new(JobRepository::new(pool)),
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            sources: store.clone(),
            articles: store.clone(),
            jobs: store,
        }
    }
}

/// The outside world as the pipeline sees it.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn ContentFetcher>,
    pub extractor: Arc<dyn TextExtractor>,
    pub generator: Arc<dyn ArticleGenerator>,
    pub feeds: Arc<dyn FeedReader>,
}

impl Collaborators {
    /// HTTP fetcher, readability extraction and the OpenAI generator.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key()
            .context("OPENAI_API_KEY must be set")?;

        let fetcher = HttpFetcher::new(FetcherSettings {
            request_timeout: config.fetch_timeout(),
            ..FetcherSettings::default()
        })?;
        let generator = OpenAiGenerator::new(OpenAiSettings {
            api_key: api_key.to_string(),
            model: config.openai_model().to_string(),
            base_url: config.openai_base_url().to_string(),
            timeout: config.generation_timeout(),
        })?;

        Ok(Self {
            fetcher: Arc::new(fetcher.clone()),
            extractor: Arc::new(ReadabilityExtractor),
            generator: Arc::new(generator),
            feeds: Arc::new(HttpFeedReader::new(fetcher)),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepositoryTrait>,
    pub sources: Arc<dyn SourceRepositoryTrait>,
    pub articles: ArticleService,
    pub runner: Arc<JobRunner>,
    pub source_runner: Arc<SourceRunner>,
    pub jwt: JwtService,
    pub passwords: Passwords,
    pub worker_secret: Arc<str>,
    pub db_pool: Option<Pool<Postgres>>,
}

impl AppState {
    pub fn new(
        stores: Stores,
        collaborators: Collaborators,
        settings: RunnerSettings,
        jwt_secret: &str,
        worker_secret: &str,
    ) -> Self {
        let mut registry = JobRegistry::new();
        registry.register(ProcessUrlHandler::new(
            stores.articles.clone(),
            collaborators.fetcher,
            collaborators.extractor,
            collaborators.generator,
            settings.min_extracted_chars,
        ));

        let runner = JobRunner::new(stores.jobs.clone(), stores.articles.clone(), registry, settings);
        let source_runner = SourceRunner::new(
            stores.sources.clone(),
            stores.articles.clone(),
            stores.jobs.clone(),
            collaborators.feeds,
            settings,
        );

        Self {
            users: stores.users,
            sources: stores.sources,
            articles: ArticleService::new(stores.articles, stores.jobs),
            runner: Arc::new(runner),
            source_runner: Arc::new(source_runner),
            jwt: JwtService::new(jwt_secret),
            passwords: Passwords::interactive(),
            worker_secret: Arc::from(worker_secret),
            db_pool: None,
        }
    }

    /// Postgres-backed state for the `api` binary.
    pub fn from_config(config: &Config, pool: Pool<Postgres>) -> Result<Self> {
        let state = Self::new(
            Stores::postgres(pool.clone()),
            Collaborators::from_config(config)?,
            config.runner(),
            config.jwt_secret(),
            config.worker_secret(),
        );
        Ok(state.with_pool(pool))
    }

    pub fn with_pool(mut self, pool: Pool<Postgres>) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn with_passwords(mut self, passwords: Passwords) -> Self {
        self.passwords = passwords;
        self
    }
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
