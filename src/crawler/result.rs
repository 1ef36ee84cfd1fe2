//! Caller-visible crawl output

use crate::dispatch::{Completion, DispatchResult};
use crate::filter::FilterStats;
use crate::frontier::{FrontierStats, Strategy};
use crate::state::{CrawlState, TaskState};
use crate::{CrawlError, TaskError};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_stream::wrappers::ReceiverStream;

/// Outcome for one URL
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// URL as discovered
    pub url: String,

    /// Deduplication key
    pub normalized_url: String,

    pub parent_url: Option<String>,
    pub depth: u32,
    pub score: f64,
    pub success: bool,

    /// Status of the last fetch attempt, if one was made
    pub status_code: Option<u16>,

    /// Links discovered on the page
    pub links_found: usize,

    pub dispatch: DispatchResult,
    pub error: Option<TaskError>,
}

impl CrawlResult {
    pub(crate) fn from_completion(completion: &Completion) -> Self {
        let task = &completion.task;
        let candidate = &task.candidate;
        Self {
            url: candidate.raw().to_string(),
            normalized_url: candidate.normalized().to_string(),
            parent_url: candidate.parent_url().map(String::from),
            depth: candidate.depth(),
            score: candidate.score(),
            success: task.state() == TaskState::Done,
            status_code: completion.fetch.as_ref().map(|f| f.status_code),
            links_found: completion
                .fetch
                .as_ref()
                .map(|f| f.discovered_links.len())
                .unwrap_or(0),
            dispatch: completion.dispatch.clone(),
            error: task.error.clone(),
        }
    }
}

/// End-of-crawl counters
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub strategy: Strategy,
    pub state: CrawlState,
    pub frontier: FrontierStats,
    pub filters: Vec<(String, FilterStats)>,
    pub peak_running: usize,
}

/// Everything a batch crawl produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub results: Vec<CrawlResult>,
    pub summary: CrawlSummary,
}

/// Results in completion order, as they happen
///
/// Single pass and finite: it ends once the frontier is exhausted and no task
/// is outstanding. A cancelled crawl ends with
/// `Err(CrawlError::Cancelled { .. })`. Dropping the stream cancels the crawl.
///
/// The crawl starts as soon as the stream is created, but it pauses once a
/// result is waiting to be read, so a slow consumer throttles admissions.
pub struct CrawlStream {
    results: ReceiverStream<Result<CrawlResult, CrawlError>>,
    summary: oneshot::Receiver<CrawlSummary>,
}

impl CrawlStream {
    pub(crate) fn new(
        results: ReceiverStream<Result<CrawlResult, CrawlError>>,
        summary: oneshot::Receiver<CrawlSummary>,
    ) -> Self {
        Self { results, summary }
    }

    /// Final counters, available once the stream has ended
    pub async fn summary(self) -> Option<CrawlSummary> {
        self.summary.await.ok()
    }
}

impl Stream for CrawlStream {
    type Item = Result<CrawlResult, CrawlError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.results).poll_next(cx)
    }
}
