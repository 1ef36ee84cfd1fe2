//! Frontier: pending and visited crawl state plus traversal order
//!
//! # Strategies
//!
//! | Strategy | Pending structure | Admission |
//! |----------|-------------------|-----------|
//! | `Bfs` | FIFO per depth level | depth and score-threshold checks |
//! | `Dfs` | LIFO stack | depth and score-threshold checks |
//! | `BestFirst` | max-heap on score, FIFO on ties | depth check only |
//!
//! A frontier is owned by exactly one crawl. It is not `Sync`-shared; the
//! orchestrator's driver task is its single writer.

mod candidate;
mod pending;

pub use candidate::CandidateUrl;

use crate::crawler::FetchResult;
use crate::filter::FilterChain;
use crate::scorer::Scorer;
use crate::url::is_seed_domain;
use crate::{ConfigError, ConfigResult, CrawlError};
use pending::PendingQueue;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    Bfs,
    Dfs,
    BestFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bfs => "bfs",
            Self::Dfs => "dfs",
            Self::BestFirst => "best-first",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle of a frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierState {
    /// Created, nothing seeded yet
    Idle,

    /// Seeds are being enqueued
    Seeding,

    /// Main loop is pulling and expanding
    Draining,

    /// No pending candidate can be admitted and nothing is in flight
    Exhausted,
}

/// Traversal settings
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierConfig {
    pub strategy: Strategy,

    /// Deepest depth ever enqueued; `None` for no cap
    pub max_depth: Option<u32>,

    /// Hard cap on admissions; `None` for no cap
    pub max_pages: Option<usize>,

    /// Follow links whose domain is not one of the seed domains
    pub include_external: bool,

    /// Minimum score for BFS/DFS admission
    pub score_threshold: Option<f64>,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Bfs,
            max_depth: None,
            max_pages: None,
            include_external: false,
            score_threshold: None,
        }
    }
}

impl FrontierConfig {
    /// Checks value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_pages == Some(0) {
            return Err(ConfigError::Validation(
                "max-pages must be greater than 0".to_string(),
            ));
        }
        if let Some(threshold) = self.score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Validation(format!(
                    "score-threshold must be between 0.0 and 1.0, got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }
}

/// Counters describing what happened to discovered links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub enqueued: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub depth_dropped: u64,
    pub threshold_dropped: u64,
    pub external_dropped: u64,
    pub invalid: u64,
}

/// Pending and visited crawl state for one crawl
pub struct Frontier {
    config: FrontierConfig,
    filter_chain: FilterChain,
    scorer: Option<Arc<dyn Scorer>>,
    pending: PendingQueue,

    /// Every normalized URL ever enqueued
    seen: HashSet<String>,

    /// Normalized URLs handed out by `next()`
    visited: HashSet<String>,

    /// Admitted but not yet completed, normalized URL -> depth
    in_flight: HashMap<String, u32>,
    in_flight_depths: BTreeMap<u32, usize>,

    seed_domains: HashSet<String>,
    state: FrontierState,
    stats: FrontierStats,
}

impl Frontier {
    /// Creates an idle frontier with an empty filter chain and no scorer
    pub fn new(config: FrontierConfig) -> Self {
        if config.strategy == Strategy::BestFirst && config.score_threshold.is_some() {
            tracing::info!("score-threshold is ignored for best-first traversal");
        }

        Self {
            pending: PendingQueue::new(config.strategy),
            config,
            filter_chain: FilterChain::new(),
            scorer: None,
            seen: HashSet::new(),
            visited: HashSet::new(),
            in_flight: HashMap::new(),
            in_flight_depths: BTreeMap::new(),
            seed_domains: HashSet::new(),
            state: FrontierState::Idle,
            stats: FrontierStats::default(),
        }
    }

    pub fn with_filter_chain(mut self, filter_chain: FilterChain) -> Self {
        self.filter_chain = filter_chain;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Enqueues the seed URLs at depth 0
    ///
    /// Seeds bypass the filter chain but are deduplicated. Their domains define
    /// what counts as external. Only allowed from `Idle`.
    ///
    /// # Returns
    ///
    /// The number of seeds enqueued
    pub fn seed(&mut self, urls: &[String]) -> crate::Result<usize> {
        if self.state != FrontierState::Idle {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: FrontierState::Seeding,
            });
        }

        let seeds = urls
            .iter()
            .map(|raw| CandidateUrl::seed(raw))
            .collect::<Result<Vec<_>, _>>()?;

        self.state = FrontierState::Seeding;

        let mut batch = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if let Some(domain) = seed.domain() {
                self.seed_domains.insert(domain);
            }
            if !self.seen.insert(seed.normalized().to_string()) {
                self.stats.duplicates += 1;
                continue;
            }
            let score = self.score(&seed);
            batch.push(seed.with_score(score));
        }

        let count = batch.len();
        self.stats.enqueued += count as u64;
        self.pending.push_batch(batch);

        tracing::info!(
            "Seeded {} URL(s) for {} traversal across {} domain(s)",
            count,
            self.config.strategy,
            self.seed_domains.len()
        );

        self.state = FrontierState::Draining;
        self.refresh_state();
        Ok(count)
    }

    /// Filters, scores and enqueues the links discovered by a fetch of `parent`
    ///
    /// Failed fetches contribute nothing. Internal links are considered before
    /// external ones, each in discovery order.
    ///
    /// # Returns
    ///
    /// The number of new candidates enqueued
    pub fn expand(&mut self, parent: &CandidateUrl, result: &FetchResult) -> usize {
        if !result.success || self.state != FrontierState::Draining || self.cap_reached() {
            return 0;
        }

        let child_depth = parent.depth() + 1;
        if self.config.max_depth.is_some_and(|max| child_depth > max) {
            self.stats.depth_dropped += result.discovered_links.len() as u64;
            return 0;
        }

        let mut batch = Vec::new();
        let links = result
            .discovered_links
            .internal
            .iter()
            .chain(result.discovered_links.external.iter());

        for link in links {
            let child = match CandidateUrl::child(parent, link) {
                Ok(child) => child,
                Err(e) => {
                    tracing::debug!("Skipping link {}: {}", link.href, e);
                    self.stats.invalid += 1;
                    continue;
                }
            };

            if self.seen.contains(child.normalized()) {
                self.stats.duplicates += 1;
                continue;
            }

            if !self.config.include_external {
                let internal = child
                    .domain()
                    .is_some_and(|d| is_seed_domain(&d, &self.seed_domains));
                if !internal {
                    tracing::trace!("Dropping external link {}", child.normalized());
                    self.stats.external_dropped += 1;
                    continue;
                }
            }

            if !self.filter_chain.evaluate(&child) {
                self.stats.filtered += 1;
                continue;
            }

            let score = self.score(&child);
            if self.config.strategy != Strategy::BestFirst {
                if let Some(threshold) = self.config.score_threshold {
                    if score < threshold {
                        tracing::debug!(
                            "Score {:.3} below threshold {:.3} for {}",
                            score,
                            threshold,
                            child.normalized()
                        );
                        self.stats.threshold_dropped += 1;
                        continue;
                    }
                }
            }

            self.seen.insert(child.normalized().to_string());
            batch.push(child.with_score(score));
        }

        let count = batch.len();
        self.stats.enqueued += count as u64;
        self.pending.push_batch(batch);
        tracing::trace!(
            "Expanded {}: {} new, {} pending",
            parent.normalized(),
            count,
            self.pending.len()
        );
        count
    }

    /// Admits the next candidate, or `None` if nothing can be admitted now
    ///
    /// Returns `None` for good once `max_pages` admissions have been made.
    /// Under BFS a candidate two or more levels below the shallowest in-flight
    /// task is held back until that task completes.
    pub fn next(&mut self) -> Option<CandidateUrl> {
        if self.state != FrontierState::Draining || self.cap_reached() {
            return None;
        }

        let depth_limit = match self.config.strategy {
            Strategy::Bfs => self.in_flight_depths.keys().next().map(|d| d + 1),
            Strategy::Dfs | Strategy::BestFirst => None,
        };

        loop {
            let candidate = self.pending.pop(depth_limit)?;
            if !self.visited.insert(candidate.normalized().to_string()) {
                continue;
            }

            self.in_flight
                .insert(candidate.normalized().to_string(), candidate.depth());
            *self.in_flight_depths.entry(candidate.depth()).or_insert(0) += 1;

            tracing::debug!(
                "Admitting {} (depth {}, score {:.3})",
                candidate.normalized(),
                candidate.depth(),
                candidate.score()
            );
            return Some(candidate);
        }
    }

    /// Records that an admitted candidate finished
    ///
    /// A successful fetch is expanded before the admission is released.
    ///
    /// # Returns
    ///
    /// The number of new candidates enqueued
    pub fn complete(&mut self, candidate: &CandidateUrl, result: Option<&FetchResult>) -> usize {
        let added = match result {
            Some(result) => self.expand(candidate, result),
            None => 0,
        };

        if let Some(depth) = self.in_flight.remove(candidate.normalized()) {
            if let Some(count) = self.in_flight_depths.get_mut(&depth) {
                *count -= 1;
                if *count == 0 {
                    self.in_flight_depths.remove(&depth);
                }
            }
        }

        self.refresh_state();
        added
    }

    /// Removes every pending candidate without admitting it
    ///
    /// Drained URLs stay known, so rediscovering them later is a duplicate.
    pub fn drain_pending(&mut self) -> Vec<CandidateUrl> {
        let drained = self.pending.drain();
        if !drained.is_empty() {
            tracing::warn!("Drained {} pending candidate(s)", drained.len());
        }
        self.refresh_state();
        drained
    }

    /// True when no pending candidate can be admitted and nothing is in flight
    pub fn is_done(&self) -> bool {
        (self.pending.is_empty() || self.cap_reached()) && self.in_flight.is_empty()
    }

    pub fn state(&self) -> FrontierState {
        self.state
    }

    pub fn stats(&self) -> FrontierStats {
        self.stats
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    pub fn filter_chain(&self) -> &FilterChain {
        &self.filter_chain
    }

    /// Number of admissions made so far
    pub fn admitted(&self) -> usize {
        self.visited.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn cap_reached(&self) -> bool {
        self.config
            .max_pages
            .is_some_and(|max| self.visited.len() >= max)
    }

    fn score(&self, candidate: &CandidateUrl) -> f64 {
        match &self.scorer {
            Some(scorer) => {
                let score = scorer.score(candidate);
                if score.is_nan() {
                    0.0
                } else {
                    score.clamp(0.0, 1.0)
                }
            }
            None => 0.0,
        }
    }

    fn refresh_state(&mut self) {
        if self.state == FrontierState::Draining && self.is_done() {
            tracing::debug!(
                "Frontier exhausted after {} admission(s)",
                self.visited.len()
            );
            self.state = FrontierState::Exhausted;
        }
    }
}

impl fmt::Debug for Frontier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frontier")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("visited", &self.visited.len())
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats)
            .finish()
    }
}
