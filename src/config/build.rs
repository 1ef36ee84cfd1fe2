//! Turns a loaded [`Config`] into the runtime settings of each component

use crate::config::types::{Config, FilterEntry, ScorerEntry};
use crate::crawler::RunConfig;
use crate::dispatch::{DispatcherConfig, RateLimitConfig};
use crate::filter::{
    ContentRelevanceFilter, ContentTypeFilter, DomainFilter, FilterChain, SeoFilter,
    UrlPatternFilter,
};
use crate::frontier::FrontierConfig;
use crate::scorer::{
    CompositeScorer, DomainAuthorityScorer, KeywordRelevanceScorer, PathDepthScorer, Scorer,
};
use crate::ConfigResult;
use std::sync::Arc;
use std::time::Duration;

/// Seconds to a duration; values validation would reject become zero
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn saturating_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl Config {
    pub fn frontier_config(&self) -> FrontierConfig {
        FrontierConfig {
            strategy: self.crawl.strategy,
            max_depth: self.crawl.max_depth.map(saturating_u32),
            max_pages: self
                .crawl
                .max_pages
                .map(|pages| usize::try_from(pages.max(0)).unwrap_or(usize::MAX)),
            include_external: self.crawl.include_external,
            score_threshold: self.crawl.score_threshold,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let section = &self.dispatcher;
        DispatcherConfig {
            policy: section.policy,
            max_session_permit: usize::try_from(section.max_session_permit.max(0))
                .unwrap_or(usize::MAX),
            memory_threshold_percent: section.memory_threshold_percent,
            check_interval: seconds(section.check_interval),
            memory_wait_timeout: seconds(section.memory_wait_timeout),
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let section = &self.rate_limit;
        let [min, max] = section.base_delay;
        RateLimitConfig {
            base_delay: (seconds(min), seconds(max)),
            max_delay: seconds(section.max_delay),
            max_retries: saturating_u32(section.max_retries),
            rate_limit_codes: section.rate_limit_codes.clone(),
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig::from(&self.user_agent)
    }

    /// Builds the filter chain in file order
    pub fn build_filter_chain(&self) -> ConfigResult<FilterChain> {
        let mut chain = FilterChain::new();
        for entry in &self.filters {
            chain = match entry {
                FilterEntry::UrlPattern { patterns, reverse } => {
                    chain.with(UrlPatternFilter::new(patterns, *reverse)?)
                }
                FilterEntry::Domain { allowed, blocked } => {
                    chain.with(DomainFilter::new(allowed, blocked))
                }
                FilterEntry::ContentType { allowed } => chain.with(ContentTypeFilter::new(allowed)),
                FilterEntry::Seo {
                    keywords,
                    threshold,
                } => chain.with(SeoFilter::new(keywords, *threshold)),
                FilterEntry::ContentRelevance { query, threshold } => {
                    chain.with(ContentRelevanceFilter::new(query, *threshold))
                }
            };
        }
        Ok(chain)
    }

    /// Builds the composite scorer, or `None` when no scorer is configured
    pub fn build_scorer(&self) -> Option<Arc<dyn Scorer>> {
        if self.scorers.is_empty() {
            return None;
        }

        let mut composite = CompositeScorer::new();
        for entry in &self.scorers {
            let scorer: Arc<dyn Scorer> = match entry {
                ScorerEntry::Keyword { keywords, .. } => {
                    Arc::new(KeywordRelevanceScorer::new(keywords, 1.0))
                }
                ScorerEntry::PathDepth { optimal_depth, .. } => Arc::new(PathDepthScorer::new(
                    usize::try_from(*optimal_depth).unwrap_or(0),
                    1.0,
                )),
                ScorerEntry::DomainAuthority {
                    weights,
                    default_weight,
                    ..
                } => Arc::new(DomainAuthorityScorer::new(weights.clone(), *default_weight)),
            };
            composite.add(scorer, entry.weight());
        }
        Some(Arc::new(composite))
    }
}
