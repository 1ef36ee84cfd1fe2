//! Crawl orchestration
//!
//! The orchestrator ties the frontier to the dispatcher:
//! - Seeding the frontier
//! - Pulling candidates up to the free concurrency budget
//! - Feeding each completion back into the frontier
//! - Yielding results in batch or streaming form
//! - Handling cancellation and memory timeouts
//!
//! Each crawl runs in a spawned driver task that owns the frontier and the
//! crawl state outright, so every mutation goes through one place.

use crate::config::Config;
use crate::crawler::result::{CrawlReport, CrawlResult, CrawlStream, CrawlSummary};
use crate::crawler::{Fetcher, RunConfig};
use crate::dispatch::{
    Completion, DispatchResult, Dispatcher, DispatcherConfig, MemoryProbe, RateLimitConfig,
    RateLimiter,
};
use crate::filter::FilterChain;
use crate::frontier::{Frontier, FrontierConfig};
use crate::scorer::Scorer;
use crate::state::{CrawlState, Task};
use crate::{ConfigResult, CrawlError, TaskError};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Results the driver may hold before it waits for the consumer
///
/// At one, the crawl runs at most one result plus the in-flight fetches
/// ahead of whoever reads the stream.
const RESULT_BUFFER: usize = 1;

/// What happens to in-flight tasks when a crawl is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelMode {
    /// Let running fetches finish and report them
    #[default]
    Drain,

    /// Stop immediately; running fetches finish unobserved
    Abandon,
}

/// Output of [`Orchestrator::run`], chosen by the `stream` setting
pub enum CrawlOutput {
    Batch(CrawlReport),
    Stream(CrawlStream),
}

/// Crawl entry point
///
/// Holds the crawl settings and the fetcher; every call to [`crawl`] or
/// [`crawl_stream`] gets its own frontier, dispatcher and rate limiter, so
/// concurrent crawls never share traversal state.
///
/// [`crawl`]: Orchestrator::crawl
/// [`crawl_stream`]: Orchestrator::crawl_stream
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    frontier_config: FrontierConfig,
    dispatcher_config: DispatcherConfig,
    rate_limit: RateLimitConfig,
    run_config: RunConfig,
    filter_chain: FilterChain,
    scorer: Option<Arc<dyn Scorer>>,
    memory_probe: Option<Arc<dyn MemoryProbe>>,
    on_cancel: CancelMode,
    stream: bool,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Creates an orchestrator with default settings
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            frontier_config: FrontierConfig::default(),
            dispatcher_config: DispatcherConfig::default(),
            rate_limit: RateLimitConfig::default(),
            run_config: RunConfig::default(),
            filter_chain: FilterChain::new(),
            scorer: None,
            memory_probe: None,
            on_cancel: CancelMode::default(),
            stream: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an orchestrator from a loaded configuration
    ///
    /// Fails on invalid settings before anything is fetched.
    pub fn from_config(config: &Config, fetcher: Arc<dyn Fetcher>) -> ConfigResult<Self> {
        crate::config::validate(config)?;
        let mut orchestrator = Self::new(fetcher)
            .with_frontier_config(config.frontier_config())
            .with_dispatcher_config(config.dispatcher_config())
            .with_rate_limit(config.rate_limit_config())
            .with_run_config(config.run_config())
            .with_filter_chain(config.build_filter_chain()?)
            .with_cancel_mode(config.crawl.on_cancel)
            .with_streaming(config.crawl.stream);
        if let Some(scorer) = config.build_scorer() {
            orchestrator = orchestrator.with_scorer(scorer);
        }
        orchestrator.validate()?;
        Ok(orchestrator)
    }

    pub fn with_frontier_config(mut self, config: FrontierConfig) -> Self {
        self.frontier_config = config;
        self
    }

    pub fn with_dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher_config = config;
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn with_run_config(mut self, config: RunConfig) -> Self {
        self.run_config = config;
        self
    }

    pub fn with_filter_chain(mut self, chain: FilterChain) -> Self {
        self.filter_chain = chain;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory_probe = Some(probe);
        self
    }

    pub fn with_cancel_mode(mut self, mode: CancelMode) -> Self {
        self.on_cancel = mode;
        self
    }

    /// Sets the mode used by [`Orchestrator::run`]
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Uses `token` as the crawl cancellation signal
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels every crawl started by this orchestrator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Checks every setting
    pub fn validate(&self) -> ConfigResult<()> {
        self.frontier_config.validate()?;
        self.dispatcher_config.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }

    /// Runs a crawl in the configured output mode
    pub async fn run(&self, seeds: &[String]) -> crate::Result<CrawlOutput> {
        if self.stream {
            Ok(CrawlOutput::Stream(self.crawl_stream(seeds).await?))
        } else {
            Ok(CrawlOutput::Batch(self.crawl(seeds).await?))
        }
    }

    /// Crawls to exhaustion and returns every result
    ///
    /// # Errors
    ///
    /// * `CrawlError::Config` / `CrawlError::UrlError` - invalid settings or seeds
    /// * `CrawlError::Cancelled` - the crawl was cancelled
    pub async fn crawl(&self, seeds: &[String]) -> crate::Result<CrawlReport> {
        let mut stream = self.crawl_stream(seeds).await?;
        let mut results = Vec::new();
        while let Some(item) = stream.next().await {
            results.push(item?);
        }

        let summary = stream.summary().await.ok_or(CrawlError::Cancelled {
            completed: results.len(),
        })?;
        Ok(CrawlReport { results, summary })
    }

    /// Starts a crawl and returns its results as a stream
    ///
    /// Settings and seeds are checked before anything is spawned.
    pub async fn crawl_stream(&self, seeds: &[String]) -> crate::Result<CrawlStream> {
        self.validate()?;

        let mut frontier = Frontier::new(self.frontier_config.clone())
            .with_filter_chain(self.filter_chain.clone());
        if let Some(scorer) = &self.scorer {
            frontier = frontier.with_scorer(scorer.clone());
        }
        frontier.seed(seeds)?;

        let cancel = self.cancel.child_token();
        let rate_limiter = Arc::new(RateLimiter::new(self.rate_limit.clone()));
        let mut dispatcher = Dispatcher::new(
            self.dispatcher_config.clone(),
            self.fetcher.clone(),
            rate_limiter,
        )
        .with_run_config(self.run_config.clone())
        .with_cancellation(cancel.clone());
        if let Some(probe) = &self.memory_probe {
            dispatcher = dispatcher.with_memory_probe(probe.clone());
        }

        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let (summary_tx, summary_rx) = oneshot::channel();
        let driver = Driver {
            frontier,
            dispatcher,
            state: CrawlState::new(),
            tx,
            cancel,
            on_cancel: self.on_cancel,
            budget: self.dispatcher_config.max_session_permit,
            emitted: 0,
        };

        tokio::spawn(async move {
            let summary = driver.run().await;
            let _ = summary_tx.send(summary);
        });

        Ok(CrawlStream::new(ReceiverStream::new(rx), summary_rx))
    }
}

/// Owns one crawl's mutable state
struct Driver {
    frontier: Frontier,
    dispatcher: Dispatcher,
    state: CrawlState,
    tx: mpsc::Sender<Result<CrawlResult, CrawlError>>,
    cancel: CancellationToken,
    on_cancel: CancelMode,
    budget: usize,
    emitted: usize,
}

impl Driver {
    async fn run(mut self) -> CrawlSummary {
        tracing::info!(
            "Starting {} crawl with up to {} concurrent task(s)",
            self.frontier.config().strategy,
            self.budget
        );

        let mut cancelled = self.cancel.is_cancelled();
        let mut consumer_gone = false;

        loop {
            if !cancelled {
                self.fill();
            }

            if self.dispatcher.outstanding() == 0 {
                break;
            }

            let completion = if cancelled {
                self.dispatcher.next_completion().await
            } else {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        tracing::info!(
                            "Crawl cancelled with {} task(s) outstanding",
                            self.dispatcher.outstanding()
                        );
                        cancelled = true;
                        if self.on_cancel == CancelMode::Abandon {
                            break;
                        }
                        continue;
                    }
                    completion = self.dispatcher.next_completion() => completion,
                }
            };

            let Some(completion) = completion else {
                break;
            };

            let memory_timeout = match &completion.task.error {
                Some(error @ TaskError::MemoryTimeoutExceeded { .. }) => Some(error.clone()),
                _ => None,
            };

            if !self.ingest(completion).await {
                consumer_gone = true;
                break;
            }

            if let Some(error) = memory_timeout {
                if !self.fail_pending(error).await {
                    consumer_gone = true;
                    break;
                }
            }
        }

        if consumer_gone {
            tracing::debug!("Result consumer dropped, cancelling crawl");
            self.cancel.cancel();
        } else if cancelled {
            let _ = self
                .tx
                .send(Err(CrawlError::Cancelled {
                    completed: self.emitted,
                }))
                .await;
        }

        self.state.finish();
        tracing::info!(
            "Crawl finished: {} admitted, {} fetched, {} failed in {:.1}s",
            self.state.pages_admitted,
            self.state.pages_fetched,
            self.state.pages_failed,
            self.state.duration_seconds().unwrap_or(0.0)
        );

        CrawlSummary {
            strategy: self.frontier.config().strategy,
            state: self.state,
            frontier: self.frontier.stats(),
            filters: self.frontier.filter_chain().stats(),
            peak_running: self.dispatcher.peak_running(),
        }
    }

    /// Submits candidates until the concurrency budget is used up
    fn fill(&mut self) {
        while self.dispatcher.outstanding() < self.budget {
            let Some(candidate) = self.frontier.next() else {
                break;
            };
            self.state.record_admission(candidate.depth());
            self.dispatcher.submit(candidate);
        }
    }

    /// Feeds a completion back into the frontier and emits its result
    ///
    /// Returns false if the consumer is gone.
    async fn ingest(&mut self, completion: Completion) -> bool {
        let result = CrawlResult::from_completion(&completion);
        let done = result.success;
        let expanded = self.frontier.complete(
            &completion.task.candidate,
            completion.fetch.as_ref().filter(|_| done),
        );
        self.state.record_outcome(done);

        match &result.error {
            None => tracing::debug!(
                "Fetched {} (depth {}, {} new link(s))",
                result.url,
                result.depth,
                expanded
            ),
            Some(error) => tracing::debug!("Failed {}: {}", result.url, error),
        }

        self.emit(result).await
    }

    /// Fails every candidate still waiting in the frontier
    async fn fail_pending(&mut self, error: TaskError) -> bool {
        let drained = self.frontier.drain_pending();
        for candidate in drained {
            let mut task = Task::new(candidate);
            if let Err(e) = task.fail(error.clone()) {
                tracing::error!("{}", e);
            }
            let dispatch = DispatchResult::new(&task, 0, Vec::new(), Duration::ZERO);
            let completion = Completion {
                task,
                fetch: None,
                dispatch,
            };
            self.state.record_outcome(false);
            if !self.emit(CrawlResult::from_completion(&completion)).await {
                return false;
            }
        }
        true
    }

    async fn emit(&mut self, result: CrawlResult) -> bool {
        if self.tx.send(Ok(result)).await.is_err() {
            return false;
        }
        self.emitted += 1;
        true
    }
}
