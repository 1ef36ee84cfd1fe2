//! Crawl orchestration and the fetch boundary
//!
//! This module contains:
//! - The [`Fetcher`] trait and its HTTP implementation
//! - HTML parsing and link extraction
//! - The [`Orchestrator`] that drives frontier and dispatcher together
//! - Caller-visible results, batch or streamed

mod coordinator;
mod fetcher;
mod parser;
mod result;

pub use coordinator::{CancelMode, CrawlOutput, Orchestrator};
pub use fetcher::{
    build_http_client, split_links, DiscoveredLinks, FetchResult, Fetcher, HttpFetcher, Link,
    RunConfig,
};
pub use parser::{parse_html, ParsedLink, ParsedPage};
pub use result::{CrawlReport, CrawlResult, CrawlStream, CrawlSummary};

use crate::config::Config;
use std::sync::Arc;

/// Runs a batch crawl over HTTP using the seeds in `config`
///
/// # Errors
///
/// * `CrawlError::Config` - invalid settings
/// * `CrawlError::Reqwest` - the HTTP client could not be built
/// * `CrawlError::Cancelled` - the crawl was cancelled
pub async fn crawl(config: &Config) -> crate::Result<CrawlReport> {
    let fetcher = HttpFetcher::new(&config.run_config())?;
    let orchestrator = Orchestrator::from_config(config, Arc::new(fetcher))?;
    orchestrator.crawl(&config.crawl.seeds).await
}
