use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::{model::Entry, parser};
use std::cmp::Reverse;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::fetcher::{FetchError, HttpFetcher};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Failed to parse feed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedReader: Send + Sync {
    /// The `limit` most recent items of a feed that carry a link.
    async fn recent_items(&self, feed_url: &str, limit: usize) -> Result<Vec<FeedItem>, FeedError>;
}

pub struct HttpFeedReader {
    fetcher: HttpFetcher,
}

impl HttpFeedReader {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl FeedReader for HttpFeedReader {
    #[instrument(skip(self), fields(url = %feed_url))]
    async fn recent_items(&self, feed_url: &str, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
        let document = self.fetcher.fetch_document(feed_url).await?;
        let items = parse_items(&document.body_raw, &document.url_final, limit)?;
        debug!(count = items.len(), "read feed items");
        Ok(items)
    }
}

/// Parse an RSS, Atom or JSON feed and keep the newest `limit` linked items.
///
/// The sort is stable: undated entries come after dated ones, in document order.
pub fn parse_items(body: &[u8], base: &Url, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
    let feed = parser::parse(body).map_err(|e| FeedError::Parse(e.to_string()))?;

    let mut items: Vec<FeedItem> = feed
        .entries
        .into_iter()
        .filter_map(|entry| to_item(entry, base))
        .collect();

    items.sort_by_key(|item| Reverse(item.published));
    items.truncate(limit);
    Ok(items)
}

fn to_item(entry: Entry, base: &Url) -> Option<FeedItem> {
    let href = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())?;

    let link = base
        .join(&href)
        .map(|u| u.to_string())
        .unwrap_or(href);

    Some(FeedItem {
        title: entry.title.map(|t| t.content),
        link,
        published: entry.published.or(entry.updated),
    })
}
