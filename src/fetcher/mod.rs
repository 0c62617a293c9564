pub mod client;
pub mod errors;
pub mod pipeline;
pub mod types;

pub use client::{ContentFetcher, HttpFetcher};
pub use errors::FetchError;
pub use types::{Charset, FetcherSettings, PageResponse};

#[cfg(test)]
pub use client::MockContentFetcher;
