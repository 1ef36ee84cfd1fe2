//! Admission control over a bounded pool of fetch tasks
//!
//! # Policies
//!
//! - [`DispatchPolicy::Semaphore`]: at most `max_session_permit` tasks run at once.
//! - [`DispatchPolicy::MemoryAdaptive`]: the same cap, plus admissions pause
//!   while system memory is above `memory_threshold_percent`. Tasks waiting
//!   longer than `memory_wait_timeout` fail instead of blocking forever.
//!
//! Every fetch runs under the per-domain [`RateLimiter`].

mod dispatcher;
mod memory;
mod rate_limiter;

pub use dispatcher::{Completion, DispatchResult, Dispatcher, TaskHandle};
pub use memory::{MemoryMonitor, MemoryProbe, MemoryStatus, SystemMemoryProbe};
pub use rate_limiter::{RateLimitConfig, RateLimitedFetch, RateLimiter};

use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Admission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPolicy {
    Semaphore,
    #[default]
    MemoryAdaptive,
}

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub policy: DispatchPolicy,

    /// Maximum concurrently running tasks
    pub max_session_permit: usize,

    /// System memory usage above which admissions pause
    pub memory_threshold_percent: f64,

    /// How often memory is sampled
    pub check_interval: Duration,

    /// How long a pause may last before waiting tasks fail
    pub memory_wait_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::MemoryAdaptive,
            max_session_permit: 10,
            memory_threshold_percent: 90.0,
            check_interval: Duration::from_secs(1),
            memory_wait_timeout: Duration::from_secs(300),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_session_permit == 0 {
            return Err(ConfigError::Validation(
                "max-session-permit must be greater than 0".to_string(),
            ));
        }
        if self.max_session_permit > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Validation(format!(
                "max-session-permit must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                self.max_session_permit
            )));
        }
        if !(self.memory_threshold_percent > 0.0 && self.memory_threshold_percent <= 100.0) {
            return Err(ConfigError::Validation(format!(
                "memory-threshold-percent must be in (0, 100], got {}",
                self.memory_threshold_percent
            )));
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::Validation(
                "check-interval must be greater than 0".to_string(),
            ));
        }
        if self.memory_wait_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "memory-wait-timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
