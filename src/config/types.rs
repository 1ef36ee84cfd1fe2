use crate::crawler::CancelMode;
use crate::dispatch::DispatchPolicy;
use crate::frontier::Strategy;
use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for Ripple-Crawl
///
/// Only `[crawl]` is required; every other section has defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub dispatcher: DispatcherSection,

    #[serde(default, rename = "rate-limit")]
    pub rate_limit: RateLimitSection,

    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub output: Option<OutputConfig>,

    #[serde(default)]
    pub filters: Vec<FilterEntry>,

    #[serde(default)]
    pub scorers: Vec<ScorerEntry>,
}

/// Traversal settings
///
/// Integer limits are read signed so that negative values reach validation
/// instead of failing as a parse error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    pub seeds: Vec<String>,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default)]
    pub max_depth: Option<i64>,

    #[serde(default)]
    pub max_pages: Option<i64>,

    #[serde(default)]
    pub include_external: bool,

    #[serde(default)]
    pub score_threshold: Option<f64>,

    /// Emit results as they complete instead of one batch
    #[serde(default)]
    pub stream: bool,

    #[serde(default)]
    pub on_cancel: CancelMode,
}

/// `[dispatcher]` section; durations are in seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DispatcherSection {
    pub policy: DispatchPolicy,
    pub max_session_permit: i64,
    pub memory_threshold_percent: f64,
    pub check_interval: f64,
    pub memory_wait_timeout: f64,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::MemoryAdaptive,
            max_session_permit: 10,
            memory_threshold_percent: 90.0,
            check_interval: 1.0,
            memory_wait_timeout: 300.0,
        }
    }
}

/// `[rate-limit]` section; delays are in seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitSection {
    pub base_delay: [f64; 2],
    pub max_delay: f64,
    pub max_retries: i64,
    pub rate_limit_codes: Vec<u16>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            base_delay: [1.0, 3.0],
            max_delay: 60.0,
            max_retries: 3,
            rate_limit_codes: vec![429, 503],
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    pub crawler_name: String,
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,

    /// Per-request timeout in seconds
    pub request_timeout: f64,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "RippleCrawl".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
            contact_email: String::new(),
            request_timeout: 30.0,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+url; email)`
    ///
    /// Missing contact details are left out, and so are the parentheses when
    /// neither is set.
    pub fn header_value(&self) -> String {
        let base = format!("{}/{}", self.crawler_name, self.crawler_version);
        let contact: Vec<String> = [
            (!self.contact_url.is_empty()).then(|| format!("+{}", self.contact_url)),
            (!self.contact_email.is_empty()).then(|| self.contact_email.clone()),
        ]
        .into_iter()
        .flatten()
        .collect();

        if contact.is_empty() {
            base
        } else {
            format!("{} ({})", base, contact.join("; "))
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: Option<String>,

    /// Path to the markdown summary file
    pub summary_path: Option<String>,
}

/// One `[[filters]]` entry, applied in file order
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FilterEntry {
    UrlPattern {
        patterns: Vec<String>,
        #[serde(default)]
        reverse: bool,
    },
    Domain {
        #[serde(default)]
        allowed: Vec<String>,
        #[serde(default)]
        blocked: Vec<String>,
    },
    ContentType {
        allowed: Vec<String>,
    },
    Seo {
        keywords: Vec<String>,
        #[serde(default = "default_seo_threshold")]
        threshold: f64,
    },
    ContentRelevance {
        query: String,
        #[serde(default = "default_relevance_threshold")]
        threshold: f64,
    },
}

/// One `[[scorers]]` entry; `weight` is its share of the composite score
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ScorerEntry {
    Keyword {
        keywords: Vec<String>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    PathDepth {
        #[serde(rename = "optimal-depth", default = "default_optimal_depth")]
        optimal_depth: i64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    DomainAuthority {
        #[serde(default)]
        weights: HashMap<String, f64>,
        #[serde(rename = "default-weight", default = "default_domain_weight")]
        default_weight: f64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
}

impl ScorerEntry {
    pub fn weight(&self) -> f64 {
        match self {
            Self::Keyword { weight, .. }
            | Self::PathDepth { weight, .. }
            | Self::DomainAuthority { weight, .. } => *weight,
        }
    }
}

fn default_seo_threshold() -> f64 {
    0.5
}

fn default_relevance_threshold() -> f64 {
    0.1
}

fn default_weight() -> f64 {
    1.0
}

fn default_optimal_depth() -> i64 {
    3
}

fn default_domain_weight() -> f64 {
    0.5
}
