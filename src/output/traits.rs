//! Output handler trait and run status
//!
//! Handlers receive every [`CrawlResult`] as it is produced and a final
//! [`CrawlSummary`] once the crawl has ended.

use crate::crawler::{CrawlResult, CrawlSummary};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Final status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Sink for crawl results
///
/// A crawl feeds one handler from a single task, so methods take `&mut self`.
pub trait OutputHandler {
    /// Records one result
    fn record_result(&mut self, result: &CrawlResult) -> OutputResult<()>;

    /// Records the end of the run
    ///
    /// `summary` is `None` when the crawl ended before producing one.
    fn finalize(&mut self, summary: Option<&CrawlSummary>, status: RunStatus)
        -> OutputResult<()>;
}
