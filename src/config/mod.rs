//! Configuration loading for Ripple-Crawl
//!
//! Settings come from a TOML file with kebab-case keys. Only `[crawl]` is
//! required; the other sections fall back to the same defaults as the
//! component builders.
//!
//! # Example
//!
//! ```no_run
//! use ripple_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Strategy: {}", config.crawl.strategy);
//! ```

mod build;
mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlConfig, DispatcherSection, FilterEntry, OutputConfig, RateLimitSection,
    ScorerEntry, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
