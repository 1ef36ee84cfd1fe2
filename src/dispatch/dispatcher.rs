use super::memory::{MemoryMonitor, MemoryProbe, MemoryStatus, SystemMemoryProbe};
use super::{DispatchPolicy, DispatcherConfig, RateLimiter};
use crate::crawler::{FetchResult, Fetcher, RunConfig};
use crate::frontier::CandidateUrl;
use crate::state::{Task, TaskState};
use crate::TaskError;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-task resource and timing snapshot
///
/// Observability only; nothing in scheduling reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub task_id: Uuid,
    pub memory_usage_mb: f64,
    pub peak_memory_mb: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    /// Fetch attempts, including rate-limit retries
    pub attempts: u32,

    /// Backoff delays taken between attempts
    pub backoffs: Vec<Duration>,

    /// Time spent waiting for admission
    pub wait_time: Duration,
}

impl DispatchResult {
    pub(crate) fn new(task: &Task, attempts: u32, backoffs: Vec<Duration>, wait_time: Duration) -> Self {
        Self {
            task_id: task.id,
            memory_usage_mb: task.memory_usage_mb,
            peak_memory_mb: task.peak_memory_mb,
            start_time: task.start_time,
            end_time: task.end_time,
            attempts,
            backoffs,
            wait_time,
        }
    }
}

/// A finished task
#[derive(Debug, Clone)]
pub struct Completion {
    pub task: Task,

    /// Result of the last fetch attempt; `None` if the task was never admitted
    pub fetch: Option<FetchResult>,

    pub dispatch: DispatchResult,
}

/// Handle to a submitted task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: Uuid,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest known state
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Waits for the task to reach a terminal state
    pub async fn wait(&mut self) -> TaskState {
        loop {
            let state = *self.state.borrow_and_update();
            if state.is_terminal() || self.state.changed().await.is_err() {
                return *self.state.borrow();
            }
        }
    }
}

#[derive(Clone)]
struct TaskContext {
    fetcher: Arc<dyn Fetcher>,
    run_config: Arc<RunConfig>,
    rate_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    memory: Option<MemoryMonitor>,
    probe: Arc<dyn MemoryProbe>,
    cancel: CancellationToken,
    running: Arc<AtomicUsize>,
    peak_running: Arc<AtomicUsize>,
}

/// Bounded pool of fetch tasks
///
/// Each submitted candidate becomes a tokio task that waits for admission,
/// fetches under the rate limiter and reports a [`Completion`]. Completion
/// order is not submission order once more than one permit exists.
pub struct Dispatcher {
    config: DispatcherConfig,
    fetcher: Arc<dyn Fetcher>,
    run_config: Arc<RunConfig>,
    rate_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    probe: Arc<dyn MemoryProbe>,
    memory: Option<MemoryMonitor>,
    cancel: CancellationToken,
    running: Arc<AtomicUsize>,
    peak_running: Arc<AtomicUsize>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    outstanding: usize,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        fetcher: Arc<dyn Fetcher>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_session_permit)),
            config,
            fetcher,
            run_config: Arc::new(RunConfig::default()),
            rate_limiter,
            probe: Arc::new(SystemMemoryProbe),
            memory: None,
            cancel: CancellationToken::new(),
            running: Arc::new(AtomicUsize::new(0)),
            peak_running: Arc::new(AtomicUsize::new(0)),
            tx,
            rx,
            outstanding: 0,
        }
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = Arc::new(run_config);
        self
    }

    /// Replaces the memory source (and resets the memory signal)
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self.memory = None;
        self
    }

    /// Tasks still waiting for admission when `cancel` fires fail with
    /// [`TaskError::Cancelled`]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn ensure_monitor(&mut self) {
        if self.config.policy == DispatchPolicy::MemoryAdaptive && self.memory.is_none() {
            self.memory = Some(MemoryMonitor::start(
                self.probe.clone(),
                self.config.memory_threshold_percent,
                self.config.check_interval,
                self.config.memory_wait_timeout,
            ));
        }
    }

    /// Submits a candidate for fetching
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, candidate: CandidateUrl) -> TaskHandle {
        self.ensure_monitor();

        let task = Task::new(candidate);
        let id = task.id;
        let (state_tx, state_rx) = watch::channel(TaskState::Pending);
        let ctx = TaskContext {
            fetcher: self.fetcher.clone(),
            run_config: self.run_config.clone(),
            rate_limiter: self.rate_limiter.clone(),
            semaphore: self.semaphore.clone(),
            memory: self.memory.clone(),
            probe: self.probe.clone(),
            cancel: self.cancel.clone(),
            running: self.running.clone(),
            peak_running: self.peak_running.clone(),
        };
        let tx = self.tx.clone();

        tracing::trace!("Submitting task {} for {}", id, task.candidate.normalized());
        self.outstanding += 1;
        tokio::spawn(async move {
            let completion = run_task(ctx, task, state_tx).await;
            // receiver gone means the crawl was abandoned
            let _ = tx.send(completion);
        });

        TaskHandle {
            id,
            state: state_rx,
        }
    }

    /// Next finished task, or `None` when nothing is outstanding
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.outstanding -= 1;
        Some(completion)
    }

    /// Submitted tasks whose completion has not been received
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Tasks currently in the Running state
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest Running count observed
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    /// Current memory signal; always `Normal` under the semaphore policy
    pub fn memory_status(&self) -> MemoryStatus {
        self.memory
            .as_ref()
            .map(MemoryMonitor::status)
            .unwrap_or(MemoryStatus::Normal)
    }
}

async fn run_task(
    ctx: TaskContext,
    mut task: Task,
    state_tx: watch::Sender<TaskState>,
) -> Completion {
    let submitted = Instant::now();

    let permit = match admit(&ctx).await {
        Ok(permit) => permit,
        Err(error) => {
            tracing::debug!(
                "Task {} for {} not admitted: {}",
                task.id,
                task.candidate.normalized(),
                error
            );
            if let Err(e) = task.fail(error) {
                tracing::error!("{}", e);
            }
            state_tx.send_replace(task.state());
            let dispatch = DispatchResult::new(&task, 0, Vec::new(), submitted.elapsed());
            return Completion {
                task,
                fetch: None,
                dispatch,
            };
        }
    };
    let wait_time = submitted.elapsed();

    if let Err(e) = task.start() {
        tracing::error!("{}", e);
    }
    state_tx.send_replace(TaskState::Running);
    let now_running = ctx.running.fetch_add(1, Ordering::SeqCst) + 1;
    ctx.peak_running.fetch_max(now_running, Ordering::SeqCst);
    let start_mb = ctx.probe.process_mb();

    let url = task.candidate.raw().to_string();
    let outcome = ctx
        .rate_limiter
        .run(&url, || {
            fetch_guarded(ctx.fetcher.as_ref(), &url, &ctx.run_config)
        })
        .await;

    task.record_memory(start_mb, ctx.probe.process_mb());
    ctx.running.fetch_sub(1, Ordering::SeqCst);
    drop(permit);

    let transition = match &outcome.error {
        Some(error) => task.fail(error.clone()),
        None if outcome.result.success => task.complete(),
        None => {
            let reason = outcome
                .result
                .error
                .clone()
                .unwrap_or_else(|| format!("HTTP {}", outcome.result.status_code));
            task.fail(TaskError::Fetch(reason))
        }
    };
    if let Err(e) = transition {
        tracing::error!("{}", e);
    }
    state_tx.send_replace(task.state());

    let dispatch = DispatchResult::new(&task, outcome.attempts, outcome.backoffs, wait_time);
    Completion {
        task,
        fetch: Some(outcome.result),
        dispatch,
    }
}

/// Waits for memory capacity and a permit
///
/// Pressure is re-checked after the permit is granted; a permit obtained
/// during a pause is handed back.
async fn admit(ctx: &TaskContext) -> Result<OwnedSemaphorePermit, TaskError> {
    let mut memory = ctx.memory.clone();

    loop {
        if ctx.cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        if let Some(monitor) = memory.as_mut() {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(TaskError::Cancelled),
                ready = monitor.wait_for_capacity() => ready?,
            }
        }

        let permit = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(TaskError::Cancelled),
            error = pressure_timeout(memory.as_mut()) => return Err(error),
            permit = ctx.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| TaskError::Cancelled)?
            }
        };

        match memory.as_ref().map(MemoryMonitor::status) {
            Some(MemoryStatus::Pressure { .. }) => drop(permit),
            _ => return Ok(permit),
        }
    }
}

async fn pressure_timeout(memory: Option<&mut MemoryMonitor>) -> TaskError {
    match memory {
        Some(monitor) => monitor.pressure_timeout().await,
        None => std::future::pending().await,
    }
}

async fn fetch_guarded(fetcher: &dyn Fetcher, url: &str, config: &RunConfig) -> FetchResult {
    match AssertUnwindSafe(fetcher.fetch(url, config)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Fetcher panicked on {}", url);
            FetchResult::failure(url, 0, "fetcher panicked")
        }
    }
}
