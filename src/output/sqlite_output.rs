//! SQLite-based output handler
//!
//! Each crawl becomes one row in `runs`; each result becomes one row in
//! `results` tied to that run. Rerunning against the same file appends a new
//! run.

use crate::crawler::{CrawlResult, CrawlSummary};
use crate::output::traits::{OutputHandler, OutputResult, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQL schema for the results database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    strategy TEXT,
    pages_admitted INTEGER,
    pages_fetched INTEGER,
    pages_failed INTEGER
);

CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    task_id TEXT NOT NULL,
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    parent_url TEXT,
    depth INTEGER NOT NULL,
    score REAL NOT NULL,
    success INTEGER NOT NULL,
    status_code INTEGER,
    links_found INTEGER NOT NULL,
    attempts INTEGER NOT NULL,
    backoff_ms INTEGER NOT NULL,
    wait_ms INTEGER NOT NULL,
    error_kind TEXT,
    error_message TEXT,
    started_at TEXT,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_results_run ON results(run_id);
CREATE INDEX IF NOT EXISTS idx_results_url ON results(normalized_url);
"#;

/// Records crawl results into SQLite
pub struct SqliteOutputHandler {
    conn: Connection,
    run_id: i64,
}

impl SqliteOutputHandler {
    /// Opens (or creates) the database at `path` and starts a new run
    pub fn open(path: &Path, config_hash: &str) -> OutputResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        Self::start(conn, config_hash)
    }

    /// Uses a private in-memory database
    pub fn open_in_memory(config_hash: &str) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::start(conn, config_hash)
    }

    fn start(conn: Connection, config_hash: &str) -> OutputResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = conn.last_insert_rowid();
        tracing::debug!("Recording results as run {}", run_id);
        Ok(Self { conn, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Results recorded for the current run
    pub fn count_results(&self) -> OutputResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM results WHERE run_id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Stored status of the current run
    pub fn run_status(&self) -> OutputResult<Option<RunStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![self.run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.as_deref().and_then(RunStatus::from_db_string))
    }
}

impl OutputHandler for SqliteOutputHandler {
    fn record_result(&mut self, result: &CrawlResult) -> OutputResult<()> {
        let dispatch = &result.dispatch;
        let backoff_ms: u128 = dispatch.backoffs.iter().map(|b| b.as_millis()).sum();
        self.conn.execute(
            "INSERT INTO results (
                run_id, task_id, url, normalized_url, parent_url, depth, score, success,
                status_code, links_found, attempts, backoff_ms, wait_ms, error_kind,
                error_message, started_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                self.run_id,
                dispatch.task_id.to_string(),
                result.url,
                result.normalized_url,
                result.parent_url,
                result.depth,
                result.score,
                result.success,
                result.status_code,
                result.links_found as i64,
                dispatch.attempts,
                i64::try_from(backoff_ms).unwrap_or(i64::MAX),
                i64::try_from(dispatch.wait_time.as_millis()).unwrap_or(i64::MAX),
                result.error.as_ref().map(|e| e.kind()),
                result.error.as_ref().map(|e| e.to_string()),
                dispatch.start_time.map(|t| t.to_rfc3339()),
                dispatch.end_time.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn finalize(
        &mut self,
        summary: Option<&CrawlSummary>,
        status: RunStatus,
    ) -> OutputResult<()> {
        let finished_at = summary
            .and_then(|s| s.state.finished_at)
            .unwrap_or_else(Utc::now)
            .to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, strategy = ?3,
                pages_admitted = ?4, pages_fetched = ?5, pages_failed = ?6
             WHERE id = ?7",
            params![
                finished_at,
                status.to_db_string(),
                summary.map(|s| s.strategy.to_string()),
                summary.map(|s| s.state.pages_admitted as i64),
                summary.map(|s| s.state.pages_fetched as i64),
                summary.map(|s| s.state.pages_failed as i64),
                self.run_id,
            ],
        )?;
        tracing::info!("Run {} finalized as {}", self.run_id, status.to_db_string());
        Ok(())
    }
}
