use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Counters for a single crawl invocation
///
/// Created when a crawl starts and dropped with it; two concurrent crawls never
/// share one.
#[derive(Debug, Clone)]
pub struct CrawlState {
    /// Candidates handed to the dispatcher
    pub pages_admitted: u64,

    /// Tasks that completed with a successful fetch
    pub pages_fetched: u64,

    /// Tasks (and drained candidates) that ended in failure
    pub pages_failed: u64,

    /// Admitted candidates per depth
    pub depth_histogram: BTreeMap<u32, u64>,

    /// Crawl start timestamp
    pub started_at: DateTime<Utc>,

    /// Set once the orchestrator loop exits
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlState {
    /// Creates an empty state stamped with the current time
    pub fn new() -> Self {
        Self {
            pages_admitted: 0,
            pages_fetched: 0,
            pages_failed: 0,
            depth_histogram: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Records an admission at the given depth
    pub fn record_admission(&mut self, depth: u32) {
        self.pages_admitted += 1;
        *self.depth_histogram.entry(depth).or_insert(0) += 1;
    }

    /// Records a completed task outcome
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.pages_fetched += 1;
        } else {
            self.pages_failed += 1;
        }
    }

    /// Marks the crawl as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Total results produced so far
    pub fn completed(&self) -> u64 {
        self.pages_fetched + self.pages_failed
    }

    /// Percentage of completed results that succeeded
    pub fn success_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            return 0.0;
        }
        self.pages_fetched as f64 / completed as f64 * 100.0
    }

    /// Wall-clock duration, if the crawl has finished
    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}
