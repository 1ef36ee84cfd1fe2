//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState` / `Task`: lifecycle of one dispatched URL (pending, running, done, failed)
//! - `DomainState`: per-domain pacing and backoff used by the rate limiter
//! - `CrawlState`: per-crawl counters and depth histogram

mod crawl_state;
mod domain_state;
mod task_state;

// Re-export main types
pub use crawl_state::CrawlState;
pub use domain_state::{sample_base_delay, DomainState};
pub use task_state::{InvalidTaskTransition, Task, TaskState};
