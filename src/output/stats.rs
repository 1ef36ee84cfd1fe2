//! Statistics derived from crawl results
//!
//! Used for the CLI report and the markdown summary.

use crate::crawler::{CrawlResult, CrawlSummary};
use crate::url::domain_of;
use crate::TaskError;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Aggregate view over one crawl
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    /// Results received
    pub total_results: u64,
    pub succeeded: u64,
    pub failed: u64,

    /// Distinct domains among result URLs
    pub unique_domains: u64,

    /// Links reported by successful fetches
    pub total_links: u64,

    /// Results per depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// Failures per [`crate::TaskError::kind`]
    pub error_summary: BTreeMap<String, u64>,

    /// Failures per HTTP status, for failures that got a response
    pub status_breakdown: BTreeMap<u16, u64>,

    /// Domains that produced at least one rate-limit backoff
    pub rate_limited_domains: Vec<String>,

    /// Rate-limit retries across all results
    pub total_backoffs: u64,

    /// Longest admission wait observed
    pub max_wait: Duration,
}

impl CrawlStats {
    /// Computes statistics from a batch of results
    pub fn from_results(results: &[CrawlResult]) -> Self {
        let mut stats = Self::default();
        let mut domains = BTreeSet::new();
        let mut rate_limited = BTreeSet::new();

        for result in results {
            stats.total_results += 1;
            *stats.depth_breakdown.entry(result.depth).or_insert(0) += 1;

            let domain = domain_of(&result.url);
            if let Some(domain) = &domain {
                domains.insert(domain.clone());
            }

            if result.success {
                stats.succeeded += 1;
                stats.total_links += result.links_found as u64;
            } else {
                stats.failed += 1;
                let kind = result.error.as_ref().map(|e| e.kind()).unwrap_or("unknown");
                *stats.error_summary.entry(kind.to_string()).or_insert(0) += 1;
                if let Some(status) = result.status_code.filter(|s| *s != 0) {
                    *stats.status_breakdown.entry(status).or_insert(0) += 1;
                }
            }

            let backoffs = result.dispatch.backoffs.len() as u64;
            stats.total_backoffs += backoffs;
            let exhausted = matches!(result.error, Some(TaskError::RateLimitExhausted { .. }));
            if backoffs > 0 || exhausted {
                if let Some(domain) = domain {
                    rate_limited.insert(domain);
                }
            }

            stats.max_wait = stats.max_wait.max(result.dispatch.wait_time);
        }

        stats.unique_domains = domains.len() as u64;
        stats.rate_limited_domains = rate_limited.into_iter().collect();
        stats
    }

    /// Percentage of results that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_results == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total_results as f64 * 100.0
    }
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CrawlStats, summary: Option<&CrawlSummary>) {
    println!("\n=== Crawl Statistics ===\n");

    if let Some(summary) = summary {
        println!("Strategy: {}", summary.strategy);
        if let Some(duration) = summary.state.duration_seconds() {
            println!("Duration: {:.1}s", duration);
        }
        println!("Peak concurrency: {}", summary.peak_running);
        println!();
    }

    println!("Results: {}", stats.total_results);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Failed: {}", stats.failed);
    println!("Success rate: {:.1}%", stats.success_rate());
    println!("Unique domains: {}", stats.unique_domains);
    println!("Links found: {}", stats.total_links);

    if !stats.depth_breakdown.is_empty() {
        println!("\nBy depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
    }

    if !stats.error_summary.is_empty() {
        println!("\nErrors:");
        for (kind, count) in &stats.error_summary {
            println!("  {}: {}", kind, count);
        }
    }

    if !stats.rate_limited_domains.is_empty() {
        println!(
            "\nRate limited ({} backoff(s)): {}",
            stats.total_backoffs,
            stats.rate_limited_domains.join(", ")
        );
    }

    if let Some(summary) = summary {
        let frontier = &summary.frontier;
        println!("\nFrontier:");
        println!("  Enqueued: {}", frontier.enqueued);
        println!("  Duplicates: {}", frontier.duplicates);
        println!("  Filtered: {}", frontier.filtered);
        println!("  Beyond max depth: {}", frontier.depth_dropped);
        println!("  Below score threshold: {}", frontier.threshold_dropped);
        println!("  External: {}", frontier.external_dropped);
    }

    println!();
}
