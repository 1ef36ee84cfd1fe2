//! Ripple-Crawl: a polite crawl orchestrator
//!
//! This crate decides which pages to visit, in what order, how many at once
//! and when to back off. Traversal lives in the [`frontier`], admission control
//! in the [`dispatch`] module, and the [`crawler`] module ties both to an
//! external [`crawler::Fetcher`].

pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod filter;
pub mod frontier;
pub mod output;
pub mod scorer;
pub mod state;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Main error type for crawl-level failures
///
/// Per-URL problems never surface here; they are carried by [`TaskError`] on
/// the individual result.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Invalid frontier transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: frontier::FrontierState,
        to: frontier::FrontierState,
    },

    #[error("Crawl cancelled after {completed} completed pages")]
    Cancelled { completed: usize },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Failure attached to a single task result
///
/// None of these abort the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Rate limit retries exhausted for {domain} after {attempts} attempts (last status {status})")]
    RateLimitExhausted {
        domain: String,
        attempts: u32,
        status: u16,
    },

    #[error("Memory pressure did not clear within {waited:?}")]
    MemoryTimeoutExceeded { waited: Duration },

    #[error("Crawl cancelled before admission")]
    Cancelled,
}

impl TaskError {
    /// Short stable label, used as a grouping key in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::RateLimitExhausted { .. } => "rate-limit-exhausted",
            Self::MemoryTimeoutExceeded { .. } => "memory-timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlResult, CrawlStream, Fetcher, FetchResult, Orchestrator};
pub use dispatch::{DispatchPolicy, Dispatcher, DispatcherConfig, RateLimitConfig, RateLimiter};
pub use filter::{FilterChain, UrlFilter};
pub use frontier::{CandidateUrl, Frontier, FrontierConfig, FrontierState, Strategy};
pub use scorer::{CompositeScorer, Scorer};
pub use state::{CrawlState, Task, TaskState};
pub use url::{extract_domain, normalize_url};
