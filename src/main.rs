//! Ripple-Crawl main entry point
//!
//! Command-line interface for running a crawl described by a TOML file.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use ripple_crawl::config::{load_config_with_hash, Config};
use ripple_crawl::crawler::{CrawlResult, HttpFetcher, Orchestrator};
use ripple_crawl::output::{
    generate_markdown_summary, print_statistics, CrawlStats, OutputHandler, RunStatus,
    SqliteOutputHandler,
};
use ripple_crawl::CrawlError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ripple-Crawl: a polite crawl orchestrator
///
/// Crawls outward from the configured seeds in BFS, DFS or best-first order,
/// bounded by depth, page count, concurrency, memory and per-domain rate
/// limits.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version)]
#[command(about = "A polite crawl orchestrator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Print each result as soon as it completes
    #[arg(long)]
    stream: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let print_results = cli.stream || config.crawl.stream;
    handle_crawl(config, &config_hash, print_results).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config) {
    let frontier = config.frontier_config();
    let dispatcher = config.dispatcher_config();
    let rate_limit = config.rate_limit_config();
    let run = config.run_config();

    println!("=== Ripple-Crawl Dry Run ===\n");

    println!("Traversal:");
    println!("  Strategy: {}", frontier.strategy);
    println!("  Max depth: {}", describe(frontier.max_depth));
    println!("  Max pages: {}", describe(frontier.max_pages));
    println!("  Include external: {}", frontier.include_external);
    println!("  Score threshold: {}", describe(frontier.score_threshold));
    println!("  On cancel: {:?}", config.crawl.on_cancel);

    println!("\nDispatcher:");
    println!("  Policy: {:?}", dispatcher.policy);
    println!("  Max concurrent tasks: {}", dispatcher.max_session_permit);
    println!(
        "  Memory threshold: {:.1}% (checked every {:?}, timeout {:?})",
        dispatcher.memory_threshold_percent,
        dispatcher.check_interval,
        dispatcher.memory_wait_timeout
    );

    println!("\nRate limiting:");
    println!(
        "  Base delay: {:?} - {:?}",
        rate_limit.base_delay.0, rate_limit.base_delay.1
    );
    println!("  Max delay: {:?}", rate_limit.max_delay);
    println!("  Max retries: {}", rate_limit.max_retries);
    println!("  Rate-limit codes: {:?}", rate_limit.rate_limit_codes);

    println!("\nUser Agent: {}", run.user_agent);
    println!("  Request timeout: {:?}", run.request_timeout);

    println!("\nFilters ({}):", config.filters.len());
    for entry in &config.filters {
        println!("  - {:?}", entry);
    }

    println!("\nScorers ({}):", config.scorers.len());
    for entry in &config.scorers {
        println!("  - {:?}", entry);
    }

    if let Some(output) = &config.output {
        println!("\nOutput:");
        if let Some(path) = &output.database_path {
            println!("  Database: {}", path);
        }
        if let Some(path) = &output.summary_path {
            println!("  Summary: {}", path);
        }
    }

    println!("\nSeeds ({}):", config.crawl.seeds.len());
    for seed in &config.crawl.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

fn describe<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unbounded".to_string())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, print_results: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.run_config()).context("Failed to build HTTP client")?;
    let orchestrator = Orchestrator::from_config(&config, Arc::new(fetcher))?;

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            cancel.cancel();
        }
    });

    let output = config.output.as_ref();
    let mut handler = match output.and_then(|o| o.database_path.as_deref()) {
        Some(path) => Some(
            SqliteOutputHandler::open(Path::new(path), config_hash)
                .with_context(|| format!("Failed to open database {}", path))?,
        ),
        None => None,
    };

    tracing::info!("Crawling from {} seed URL(s)", config.crawl.seeds.len());
    let mut stream = orchestrator.crawl_stream(&config.crawl.seeds).await?;

    let mut results: Vec<CrawlResult> = Vec::new();
    let mut status = RunStatus::Completed;
    while let Some(item) = stream.next().await {
        match item {
            Ok(result) => {
                if print_results {
                    print_result(&result);
                }
                if let Some(handler) = handler.as_mut() {
                    handler.record_result(&result)?;
                }
                results.push(result);
            }
            Err(CrawlError::Cancelled { completed }) => {
                tracing::warn!("Crawl cancelled after {} result(s)", completed);
                status = RunStatus::Cancelled;
            }
            Err(e) => {
                tracing::error!("Crawl failed: {}", e);
                status = RunStatus::Failed;
            }
        }
    }
    let summary = stream.summary().await;

    if let Some(handler) = handler.as_mut() {
        handler.finalize(summary.as_ref(), status)?;
    }

    if let Some(path) = output.and_then(|o| o.summary_path.as_deref()) {
        generate_markdown_summary(&results, summary.as_ref(), status, Path::new(path))
            .with_context(|| format!("Failed to write summary {}", path))?;
        tracing::info!("Summary written to {}", path);
    }

    print_statistics(&CrawlStats::from_results(&results), summary.as_ref());

    match status {
        RunStatus::Failed => anyhow::bail!("Crawl failed"),
        _ => Ok(()),
    }
}

fn print_result(result: &CrawlResult) {
    match &result.error {
        None => println!(
            "[{}] depth={} score={:.2} links={} {}",
            result.status_code.unwrap_or(0),
            result.depth,
            result.score,
            result.links_found,
            result.url
        ),
        Some(error) => println!("[ERR] depth={} {} ({})", result.depth, result.url, error),
    }
}
