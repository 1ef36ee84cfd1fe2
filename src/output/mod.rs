//! Result sinks and crawl reports
//!
//! This module handles:
//! - Persisting results and run records to SQLite
//! - Deriving statistics from results
//! - Generating markdown summaries

mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sqlite_output::SqliteOutputHandler;
pub use stats::{print_statistics, CrawlStats};
pub use traits::{OutputError, OutputHandler, OutputResult, RunStatus};
