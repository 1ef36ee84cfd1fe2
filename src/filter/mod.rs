//! URL filters and the short-circuiting filter chain
//!
//! A filter is a yes/no gate over a [`CandidateUrl`]. The chain evaluates
//! filters in order and stops at the first rejection, so a filter may rely on
//! properties guaranteed by the filters before it.

mod content_type;
mod domain;
mod pattern;
mod relevance;
mod seo;

pub use content_type::ContentTypeFilter;
pub use domain::DomainFilter;
pub use pattern::UrlPatternFilter;
pub use relevance::ContentRelevanceFilter;
pub use seo::SeoFilter;

use crate::frontier::CandidateUrl;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A single admission gate
///
/// Implement this trait to plug a custom filter into a [`FilterChain`].
pub trait UrlFilter: Send + Sync {
    /// Name used in logs and statistics
    fn name(&self) -> &str;

    /// Returns true if the candidate may proceed
    fn apply(&self, candidate: &CandidateUrl) -> bool;
}

/// Evaluation counters for one filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total: u64,
    pub passed: u64,
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    passed: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn record(&self, passed: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> FilterStats {
        FilterStats {
            total: self.total.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone)]
struct Entry {
    filter: Arc<dyn UrlFilter>,
    counters: Arc<Counters>,
}

/// Ordered conjunction of filters
///
/// An empty chain accepts everything.
#[derive(Clone, Default)]
pub struct FilterChain {
    entries: Vec<Entry>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter, builder style
    pub fn with(mut self, filter: impl UrlFilter + 'static) -> Self {
        self.add(Arc::new(filter));
        self
    }

    /// Appends a shared filter
    pub fn add(&mut self, filter: Arc<dyn UrlFilter>) {
        self.entries.push(Entry {
            filter,
            counters: Arc::new(Counters::default()),
        });
    }

    /// Runs the filters in order, stopping at the first rejection
    pub fn evaluate(&self, candidate: &CandidateUrl) -> bool {
        for entry in &self.entries {
            let passed = entry.filter.apply(candidate);
            entry.counters.record(passed);
            if !passed {
                tracing::debug!(
                    "Filter '{}' rejected {}",
                    entry.filter.name(),
                    candidate.normalized()
                );
                return false;
            }
        }
        true
    }

    /// Per-filter counters, in chain order
    pub fn stats(&self) -> Vec<(String, FilterStats)> {
        self.entries
            .iter()
            .map(|e| (e.filter.name().to_string(), e.counters.snapshot()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.filter.name()))
            .finish()
    }
}

/// Lowercase alphanumeric tokens of `text`
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Anchor text, context and URL path of a candidate joined into one document
pub(crate) fn link_document(candidate: &CandidateUrl, include_path: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(text) = candidate.anchor_text() {
        parts.push(text.to_string());
    }
    if let Some(context) = candidate.context() {
        parts.push(context.to_string());
    }
    if include_path {
        parts.push(candidate.path());
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Fixed {
        name: &'static str,
        result: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(name: &'static str, result: bool) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    result,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl UrlFilter for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn apply(&self, _candidate: &CandidateUrl) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
        }
    }

    fn candidate() -> CandidateUrl {
        CandidateUrl::seed("https://example.com/page").unwrap()
    }

    #[test]
    fn test_empty_chain_accepts() {
        assert!(FilterChain::new().evaluate(&candidate()));
    }

    #[test]
    fn test_short_circuit_skips_later_filters() {
        let (first, first_calls) = Fixed::new("first", true);
        let (rejecting, rejecting_calls) = Fixed::new("rejecting", false);
        let (after, after_calls) = Fixed::new("after", true);
        let chain = FilterChain::new().with(first).with(rejecting).with(after);

        assert!(!chain.evaluate(&candidate()));
        assert!(!chain.evaluate(&candidate()));

        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
        assert_eq!(rejecting_calls.load(Ordering::SeqCst), 2);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stats_per_filter() {
        let (pass, _) = Fixed::new("pass", true);
        let (reject, _) = Fixed::new("reject", false);
        let chain = FilterChain::new().with(pass).with(reject);
        chain.evaluate(&candidate());

        let stats = chain.stats();
        assert_eq!(stats[0].0, "pass");
        assert_eq!(
            stats[0].1,
            FilterStats {
                total: 1,
                passed: 1,
                rejected: 0
            }
        );
        assert_eq!(stats[1].1.rejected, 1);
    }

    #[test]
    fn test_cloned_chain_shares_counters() {
        let (pass, _) = Fixed::new("pass", true);
        let chain = FilterChain::new().with(pass);
        let clone = chain.clone();
        clone.evaluate(&candidate());
        assert_eq!(chain.stats()[0].1.total, 1);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Async-Rust: the /docs/guide_2"),
            vec!["async", "rust", "the", "docs", "guide", "2"]
        );
    }
}
