//! Orchestrator properties over an in-memory link graph
//!
//! No network: a `GraphFetcher` serves pages from a map, which makes
//! traversal order, caps and concurrency fully observable.

use async_trait::async_trait;
use futures::StreamExt;
use ripple_crawl::crawler::{
    CancelMode, CrawlResult, DiscoveredLinks, FetchResult, Fetcher, Link, Orchestrator, RunConfig,
};
use ripple_crawl::dispatch::{
    DispatchPolicy, DispatcherConfig, MemoryProbe, RateLimitConfig,
};
use ripple_crawl::frontier::{CandidateUrl, FrontierConfig, Strategy};
use ripple_crawl::scorer::Scorer;
use ripple_crawl::{CrawlError, TaskError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const SITE: &str = "https://site.test";

fn url(name: &str) -> String {
    if name.is_empty() {
        format!("{}/", SITE)
    } else {
        format!("{}/{}", SITE, name)
    }
}

/// Serves pages from an adjacency map and records what it was asked for
#[derive(Default)]
struct GraphFetcher {
    graph: HashMap<String, Vec<String>>,
    delay: Duration,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GraphFetcher {
    fn new(edges: &[(&str, &[&str])]) -> Self {
        let graph = edges
            .iter()
            .map(|(from, to)| (url(from), to.iter().map(|t| url(t)).collect()))
            .collect();
        Self {
            graph,
            ..Default::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for GraphFetcher {
    async fn fetch(&self, url: &str, _config: &RunConfig) -> FetchResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(url.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.graph.get(url) {
            Some(children) => FetchResult::success(
                url,
                200,
                DiscoveredLinks {
                    internal: children.iter().map(|c| Link::from(c.as_str())).collect(),
                    external: Vec::new(),
                },
            ),
            None => FetchResult::failure(url, 404, "HTTP 404"),
        }
    }
}

/// Fixed score per URL, 0 for anything unlisted
struct TableScorer(HashMap<String, f64>);

impl Scorer for TableScorer {
    fn score(&self, candidate: &CandidateUrl) -> f64 {
        self.0.get(candidate.raw()).copied().unwrap_or(0.0)
    }
}

/// Memory reading controlled by the test
#[derive(Clone)]
struct SharedProbe(Arc<AtomicU64>);

impl SharedProbe {
    fn new(percent: f64) -> Self {
        Self(Arc::new(AtomicU64::new(percent.to_bits())))
    }

    fn set(&self, percent: f64) {
        self.0.store(percent.to_bits(), Ordering::SeqCst);
    }
}

impl MemoryProbe for SharedProbe {
    fn usage_percent(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }
}

fn orchestrator(fetcher: Arc<dyn Fetcher>, strategy: Strategy, permits: usize) -> Orchestrator {
    Orchestrator::new(fetcher)
        .with_frontier_config(FrontierConfig {
            strategy,
            ..Default::default()
        })
        .with_dispatcher_config(DispatcherConfig {
            policy: DispatchPolicy::Semaphore,
            max_session_permit: permits,
            ..Default::default()
        })
        .with_rate_limit(RateLimitConfig {
            base_delay: (Duration::ZERO, Duration::ZERO),
            ..Default::default()
        })
}

fn scenario() -> GraphFetcher {
    GraphFetcher::new(&[
        ("a", &["b", "c"]),
        ("b", &["d"]),
        ("c", &["e"]),
        ("d", &[]),
        ("e", &[]),
    ])
}

fn names(results: &[CrawlResult]) -> Vec<String> {
    results
        .iter()
        .map(|r| r.url.trim_start_matches(SITE).trim_start_matches('/').to_string())
        .collect()
}

#[tokio::test]
async fn test_bfs_level_order() {
    let fetcher = Arc::new(scenario());
    let report = orchestrator(fetcher.clone(), Strategy::Bfs, 1)
        .with_frontier_config(FrontierConfig {
            strategy: Strategy::Bfs,
            max_depth: Some(2),
            ..Default::default()
        })
        .crawl(&[url("a")])
        .await
        .unwrap();

    assert_eq!(names(&report.results), vec!["a", "b", "c", "d", "e"]);
    let depths: Vec<u32> = report.results.iter().map(|r| r.depth).collect();
    assert_eq!(depths, vec![0, 1, 1, 2, 2]);
}

#[tokio::test]
async fn test_bfs_never_skips_a_level_with_concurrency() {
    let fetcher = Arc::new(scenario().with_delay(Duration::from_millis(5)));
    let report = orchestrator(fetcher, Strategy::Bfs, 4)
        .crawl(&[url("a")])
        .await
        .unwrap();

    assert_eq!(report.results.len(), 5);
    for window in report.results.windows(2) {
        assert!(window[1].depth + 1 >= window[0].depth);
    }
    assert_eq!(report.results[0].depth, 0);
}

#[tokio::test]
async fn test_dfs_branch_order() {
    let fetcher = Arc::new(scenario());
    let report = orchestrator(fetcher, Strategy::Dfs, 1)
        .crawl(&[url("a")])
        .await
        .unwrap();

    assert_eq!(names(&report.results), vec!["a", "b", "d", "c", "e"]);
}

#[tokio::test]
async fn test_best_first_prefers_high_scores() {
    let scores = HashMap::from([
        (url("b"), 0.1),
        (url("c"), 0.9),
        (url("d"), 0.05),
        (url("e"), 0.8),
    ]);
    let fetcher = Arc::new(scenario());
    let report = orchestrator(fetcher, Strategy::BestFirst, 1)
        .with_scorer(Arc::new(TableScorer(scores)))
        .crawl(&[url("a")])
        .await
        .unwrap();

    assert_eq!(names(&report.results), vec!["a", "c", "e", "b", "d"]);
    assert!((report.results[1].score - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn test_no_duplicate_admissions_in_cyclic_graph() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        ("", &["x", "y", ""]),
        ("x", &["y", "", "x#top"]),
        ("y", &["x", "z"]),
        ("z", &["", "x", "y"]),
    ]));
    let report = orchestrator(fetcher.clone(), Strategy::Bfs, 3)
        .crawl(&[url(""), url("")])
        .await
        .unwrap();

    let unique: HashSet<&str> = report
        .results
        .iter()
        .map(|r| r.normalized_url.as_str())
        .collect();
    assert_eq!(unique.len(), report.results.len());
    assert_eq!(report.results.len(), 4);
    assert_eq!(fetcher.fetched().len(), 4);
    assert!(report.summary.frontier.duplicates > 0);
}

#[tokio::test]
async fn test_max_pages_caps_admissions() {
    let chain: Vec<(String, Vec<String>)> = (0..20)
        .map(|i| (format!("p{}", i), vec![format!("p{}", i + 1)]))
        .collect();
    let edges: Vec<(&str, Vec<&str>)> = chain
        .iter()
        .map(|(from, to)| (from.as_str(), to.iter().map(String::as_str).collect()))
        .collect();
    let edges: Vec<(&str, &[&str])> = edges.iter().map(|(f, t)| (*f, t.as_slice())).collect();

    for (cap, expected) in [(5, 5), (50, 21)] {
        let fetcher = Arc::new(GraphFetcher::new(&edges));
        let report = orchestrator(fetcher.clone(), Strategy::Bfs, 2)
            .with_frontier_config(FrontierConfig {
                max_pages: Some(cap),
                ..Default::default()
            })
            .crawl(&[url("p0")])
            .await
            .unwrap();

        assert_eq!(report.results.len(), expected);
        assert_eq!(fetcher.fetched().len(), expected);
        assert_eq!(report.summary.state.pages_admitted, expected as u64);
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_bound() {
    let children: Vec<String> = (0..30).map(|i| format!("c{}", i)).collect();
    let children: Vec<&str> = children.iter().map(String::as_str).collect();
    let fetcher = Arc::new(
        GraphFetcher::new(&[("", children.as_slice())]).with_delay(Duration::from_millis(50)),
    );

    let report = orchestrator(fetcher.clone(), Strategy::Bfs, 4)
        .crawl(&[url("")])
        .await
        .unwrap();

    assert_eq!(report.results.len(), 31);
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 4);
    assert!(report.summary.peak_running <= 4);
}

/// Holds one URL until released
struct GatedFetcher {
    inner: GraphFetcher,
    gated: String,
    gate: Arc<Notify>,
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, url: &str, config: &RunConfig) -> FetchResult {
        if url == self.gated {
            self.gate.notified().await;
        }
        self.inner.fetch(url, config).await
    }
}

#[tokio::test]
async fn test_stream_yields_before_crawl_ends() {
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(GatedFetcher {
        inner: GraphFetcher::new(&[("fast", &[]), ("slow", &["after"])]),
        gated: url("slow"),
        gate: gate.clone(),
    });

    let mut stream = orchestrator(fetcher, Strategy::Bfs, 2)
        .crawl_stream(&[url("fast"), url("slow")])
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.url, url("fast"));

    gate.notify_one();
    let rest: Vec<CrawlResult> = stream
        .by_ref()
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(names(&rest), vec!["slow", "after"]);
    assert!(stream.summary().await.is_some());
}

#[tokio::test]
async fn test_unread_stream_holds_back_the_crawl() {
    let chain: Vec<String> = (0..10).map(|i| format!("n{}", i)).collect();
    let edges: Vec<(&str, Vec<&str>)> = chain
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let next = chain.get(i + 1).map(|n| vec![n.as_str()]).unwrap_or_default();
            (name.as_str(), next)
        })
        .collect();
    let edge_refs: Vec<(&str, &[&str])> = edges.iter().map(|(f, t)| (*f, t.as_slice())).collect();
    let fetcher = Arc::new(GraphFetcher::new(&edge_refs));

    let mut stream = orchestrator(fetcher.clone(), Strategy::Bfs, 1)
        .crawl_stream(&[url("n0")])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(fetcher.fetched().len() <= 3, "{:?}", fetcher.fetched());

    let mut count = 0;
    while let Some(item) = stream.next().await {
        item.unwrap();
        count += 1;
    }
    assert_eq!(count, 10);
    assert_eq!(fetcher.fetched().len(), 10);
}

#[tokio::test]
async fn test_failed_fetch_is_not_expanded() {
    struct BrokenWithLinks;

    #[async_trait]
    impl Fetcher for BrokenWithLinks {
        async fn fetch(&self, url: &str, _config: &RunConfig) -> FetchResult {
            FetchResult {
                url: url.to_string(),
                success: false,
                status_code: 500,
                discovered_links: DiscoveredLinks {
                    internal: vec![Link::from("https://site.test/child")],
                    external: Vec::new(),
                },
                error: Some("HTTP 500".to_string()),
            }
        }
    }

    let report = orchestrator(Arc::new(BrokenWithLinks), Strategy::Bfs, 2)
        .crawl(&[url("")])
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(!report.results[0].success);
    assert_eq!(report.results[0].status_code, Some(500));
    assert_eq!(report.summary.frontier.enqueued, 1);
}

#[tokio::test]
async fn test_score_threshold_drops_low_scores() {
    let scores = HashMap::from([(url(""), 1.0), (url("b"), 0.9), (url("c"), 0.1)]);
    let fetcher = Arc::new(GraphFetcher::new(&[("", &["b", "c"]), ("b", &[])]));
    let report = orchestrator(fetcher, Strategy::Bfs, 1)
        .with_frontier_config(FrontierConfig {
            score_threshold: Some(0.5),
            ..Default::default()
        })
        .with_scorer(Arc::new(TableScorer(scores)))
        .crawl(&[url("")])
        .await
        .unwrap();

    assert_eq!(names(&report.results), vec!["", "b"]);
    assert_eq!(report.summary.frontier.threshold_dropped, 1);
}

/// Raises memory pressure while its page is being fetched
struct PressureFetcher {
    inner: GraphFetcher,
    probe: SharedProbe,
}

#[async_trait]
impl Fetcher for PressureFetcher {
    async fn fetch(&self, url: &str, config: &RunConfig) -> FetchResult {
        self.probe.set(99.0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.inner.fetch(url, config).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_memory_timeout_fails_waiting_tasks() {
    let probe = SharedProbe::new(10.0);
    let fetcher = Arc::new(PressureFetcher {
        inner: GraphFetcher::new(&[("", &["b", "c"])]),
        probe: probe.clone(),
    });

    let report = orchestrator(fetcher, Strategy::Bfs, 4)
        .with_dispatcher_config(DispatcherConfig {
            policy: DispatchPolicy::MemoryAdaptive,
            max_session_permit: 4,
            memory_threshold_percent: 90.0,
            check_interval: Duration::from_millis(100),
            memory_wait_timeout: Duration::from_secs(1),
        })
        .with_memory_probe(Arc::new(probe))
        .crawl(&[url("")])
        .await
        .unwrap();

    assert_eq!(report.results.len(), 3);
    let root = &report.results[0];
    assert!(root.success, "the running task completes");
    for result in &report.results[1..] {
        assert!(!result.success);
        assert!(matches!(
            result.error,
            Some(TaskError::MemoryTimeoutExceeded { .. })
        ));
    }
    assert_eq!(report.summary.state.pages_failed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_drains_running_tasks() {
    let children: Vec<String> = (0..10).map(|i| format!("c{}", i)).collect();
    let children: Vec<&str> = children.iter().map(String::as_str).collect();
    let fetcher = Arc::new(
        GraphFetcher::new(&[("", children.as_slice())]).with_delay(Duration::from_secs(1)),
    );

    let orchestrator = orchestrator(fetcher.clone(), Strategy::Bfs, 2)
        .with_cancel_mode(CancelMode::Drain);
    let token = orchestrator.cancellation_token();
    let mut stream = orchestrator.crawl_stream(&[url("")]).await.unwrap();

    let root = stream.next().await.unwrap().unwrap();
    assert!(root.success);
    token.cancel();

    let mut completed = 1;
    let mut cancelled = false;
    while let Some(item) = stream.next().await {
        match item {
            Ok(_) => completed += 1,
            Err(CrawlError::Cancelled { completed: n }) => {
                assert_eq!(n, completed);
                cancelled = true;
            }
            Err(other) => panic!("unexpected error {}", other),
        }
    }

    assert!(cancelled);
    assert!(completed < 11);
    assert!(fetcher.fetched().len() <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_batch_crawl_returns_error() {
    let fetcher = Arc::new(scenario().with_delay(Duration::from_secs(1)));
    let orchestrator = orchestrator(fetcher, Strategy::Bfs, 1).with_cancel_mode(CancelMode::Abandon);
    let token = orchestrator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        token.cancel();
    });

    let err = orchestrator.crawl(&[url("a")]).await.unwrap_err();
    assert!(matches!(err, CrawlError::Cancelled { .. }));
}

#[tokio::test]
async fn test_concurrent_crawls_do_not_share_state() {
    let fetcher = Arc::new(scenario());
    let orchestrator = orchestrator(fetcher, Strategy::Bfs, 2);

    let seeds = [url("a")];
    let (first, second) = tokio::join!(orchestrator.crawl(&seeds), orchestrator.crawl(&seeds));
    assert_eq!(first.unwrap().results.len(), 5);
    assert_eq!(second.unwrap().results.len(), 5);
}
