use crate::fetcher::{
    errors::{FetchError, is_retriable_status},
    pipeline::process_response,
    types::{FetcherSettings, PageResponse},
};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, header};
use tracing::{debug, instrument};

/// Retrieves article pages for the job pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<PageResponse, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Html,
    Feed,
}

impl DocumentKind {
    fn accept(&self) -> &'static str {
        match self {
            DocumentKind::Html => "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            DocumentKind::Feed => {
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/xml;q=0.9,*/*;q=0.5"
            }
        }
    }

    fn allows(&self, content_type: &str) -> bool {
        let ct = content_type.to_ascii_lowercase();
        match self {
            DocumentKind::Html => ct.contains("text/html") || ct.contains("application/xhtml"),
            DocumentKind::Feed => {
                ct.contains("xml")
                    || ct.contains("rss")
                    || ct.contains("atom")
                    || ct.contains("json")
                    || ct.contains("text/plain")
                    || ct.contains("text/html")
            }
        }
    }
}

/// HTTP client with the service's identifying signature and deadlines.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_body_size: u64,
}

impl HttpFetcher {
    pub fn new(settings: FetcherSettings) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .build()
            .map_err(|e| FetchError::Unknown(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            max_body_size: settings.max_body_size,
        })
    }

    /// Download an HTML page.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<PageResponse, FetchError> {
        self.fetch_as(url, DocumentKind::Html).await
    }

    /// Download a feed document (RSS, Atom or JSON Feed).
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_document(&self, url: &str) -> Result<PageResponse, FetchError> {
        self.fetch_as(url, DocumentKind::Feed).await
    }

    async fn fetch_as(&self, url: &str, kind: DocumentKind) -> Result<PageResponse, FetchError> {
        let parsed_url = url::Url::parse(url)?;
        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(parsed_url.scheme().to_string()));
        }

        let response = self
            .client
            .get(parsed_url)
            .header(header::ACCEPT, kind.accept())
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        // Check content length before downloading
        if let Some(content_length) = response.content_length()
            && content_length > self.max_body_size
        {
            return Err(FetchError::BodyTooLarge(content_length));
        }

        let final_url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            return Err(FetchError::Http {
                status,
                retriable: is_retriable_status(status),
            });
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        if !kind.allows(&content_type) {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        let body_bytes = response
            .bytes()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        // Content-Length may have been missing or wrong
        if body_bytes.len() as u64 > self.max_body_size {
            return Err(FetchError::BodyTooLarge(body_bytes.len() as u64));
        }

        debug!(status = %status, bytes = body_bytes.len(), "downloaded document");
        process_response(final_url, status, headers, body_bytes, &content_type)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<PageResponse, FetchError> {
        HttpFetcher::fetch_page(self, url).await
    }
}
