//! The Fetcher contract and its HTTP implementation
//!
//! The orchestrator only ever sees [`FetchResult`]: whether the fetch worked,
//! the status code, and the links discovered on the page. Everything about how
//! a page is retrieved and parsed stays behind the [`Fetcher`] trait.

use crate::config::UserAgentConfig;
use crate::crawler::parser::parse_html;
use crate::url::extract_domain;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops the HTTP client follows
const MAX_REDIRECTS: usize = 10;

/// Per-run settings handed to the fetcher on every call
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Value for the User-Agent header
    pub user_agent: String,

    /// Timeout for a single request
    pub request_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("RippleCrawl/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&UserAgentConfig> for RunConfig {
    fn from(config: &UserAgentConfig) -> Self {
        Self {
            user_agent: config.header_value(),
            request_timeout: Duration::try_from_secs_f64(config.request_timeout)
                .unwrap_or(Duration::from_secs(30)),
        }
    }
}

/// A link discovered on a fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Absolute target URL
    pub href: String,

    /// Anchor text
    pub text: Option<String>,

    /// Text surrounding the link (page title/description for HTML pages)
    pub context: Option<String>,
}

impl From<&str> for Link {
    fn from(href: &str) -> Self {
        Self {
            href: href.to_string(),
            text: None,
            context: None,
        }
    }
}

/// Links discovered on a page, split by whether they stay on the page's domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredLinks {
    pub internal: Vec<Link>,
    pub external: Vec<Link>,
}

impl DiscoveredLinks {
    /// Total number of links
    pub fn len(&self) -> usize {
        self.internal.len() + self.external.len()
    }

    /// True if no links were discovered
    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }
}

/// Outcome of a single fetch
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL that was requested
    pub url: String,

    /// True if the page was retrieved successfully
    pub success: bool,

    /// HTTP status code, 0 if no response was received
    pub status_code: u16,

    /// Links found on the page (empty unless `success`)
    pub discovered_links: DiscoveredLinks,

    /// Failure description when `success` is false
    pub error: Option<String>,
}

impl FetchResult {
    /// A successful result with the given links
    pub fn success(url: impl Into<String>, status_code: u16, links: DiscoveredLinks) -> Self {
        Self {
            url: url.into(),
            success: true,
            status_code,
            discovered_links: links,
            error: None,
        }
    }

    /// A failed result
    pub fn failure(url: impl Into<String>, status_code: u16, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            status_code,
            discovered_links: DiscoveredLinks::default(),
            error: Some(error.into()),
        }
    }
}

/// Performs the actual retrieval of a page
///
/// Implementations must not panic on network problems; every failure is
/// reported through [`FetchResult::failure`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, config: &RunConfig) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::crawler::{build_http_client, RunConfig};
///
/// let client = build_http_client(&RunConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &RunConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Reference fetcher: plain HTTP GET plus HTML link extraction
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose client carries the run's user agent
    pub fn new(config: &RunConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, config: &RunConfig) -> FetchResult {
        let response = match self
            .client
            .get(url)
            .timeout(config.request_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchResult::failure(url, 0, classify_error(&e)),
        };

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return FetchResult::failure(url, status.as_u16(), format!("HTTP {}", status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        // Non-HTML pages count as fetched but their body is never read
        if !content_type.is_empty() && !content_type.contains("text/html") {
            tracing::debug!("{} is {}, skipping body", url, content_type);
            return FetchResult::success(url, status.as_u16(), DiscoveredLinks::default());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchResult::failure(url, status.as_u16(), classify_error(&e)),
        };

        let links = split_links(&body, &final_url);
        FetchResult::success(url, status.as_u16(), links)
    }
}

/// Parses `body` and splits its links by domain relative to `page_url`
pub fn split_links(body: &str, page_url: &Url) -> DiscoveredLinks {
    let parsed = parse_html(body, page_url);
    let context = parsed.context();
    let page_domain = extract_domain(page_url);

    let mut links = DiscoveredLinks::default();
    for parsed_link in parsed.links {
        let link_domain = Url::parse(&parsed_link.href)
            .ok()
            .as_ref()
            .and_then(extract_domain);
        let link = Link {
            href: parsed_link.href,
            text: parsed_link.text,
            context: context.clone(),
        };
        if link_domain.is_some() && link_domain == page_domain {
            links.internal.push(link);
        } else {
            links.external.push(link);
        }
    }
    links
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else {
        e.to_string()
    }
}
