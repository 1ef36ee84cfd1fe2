//! Per-domain pacing and rate-limit backoff

use crate::crawler::FetchResult;
use crate::state::DomainState;
use crate::url::domain_of;
use crate::{ConfigError, ConfigResult, TaskError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Rate-limit policy
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// `[min, max)` range the initial per-domain delay is drawn from
    pub base_delay: (Duration, Duration),

    /// Ceiling for the backed-off delay
    pub max_delay: Duration,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Status codes that signal rate limiting
    pub rate_limit_codes: Vec<u16>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: (Duration::from_secs(1), Duration::from_secs(3)),
            max_delay: Duration::from_secs(60),
            max_retries: 3,
            rate_limit_codes: vec![429, 503],
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = self.base_delay;
        if min > max {
            return Err(ConfigError::Validation(format!(
                "base-delay minimum ({:?}) exceeds maximum ({:?})",
                min, max
            )));
        }
        if self.max_delay < min {
            return Err(ConfigError::Validation(format!(
                "max-delay ({:?}) is below the base delay ({:?})",
                self.max_delay, min
            )));
        }
        Ok(())
    }
}

/// A fetch carried out under the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitedFetch {
    /// Result of the last attempt
    pub result: FetchResult,

    /// Attempts made, at most `max_retries + 1`
    pub attempts: u32,

    /// Delay chosen after each rate-limited attempt
    pub backoffs: Vec<Duration>,

    /// Set when every attempt was rate limited
    pub error: Option<TaskError>,
}

/// Per-domain delay and exponential backoff
///
/// One throttled domain never slows down another: all state lives in a
/// [`DomainState`] keyed by domain. The lock is never held across an await.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Mutex<HashMap<String, DomainState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// True if `status` is one of the configured rate-limit codes
    pub fn is_rate_limit_status(&self, status: u16) -> bool {
        self.config.rate_limit_codes.contains(&status)
    }

    fn with_domain<T>(&self, domain: &str, f: impl FnOnce(&mut DomainState) -> T) -> T {
        let mut domains = self
            .domains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(&self.config));
        f(state)
    }

    /// Waits for this domain's next request slot
    ///
    /// # Returns
    ///
    /// How long the caller waited
    pub async fn wait_for_slot(&self, domain: &str) -> Duration {
        let wait = self.with_domain(domain, |state| state.reserve(Instant::now()));
        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before requesting {}", wait, domain);
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Grows the domain's delay after a rate-limited response
    ///
    /// The next slot is pushed out by the new delay from now.
    pub fn record_rate_limited(&self, domain: &str) -> Duration {
        self.with_domain(domain, |state| {
            let delay = state.record_rate_limited(&self.config);
            state.last_slot = Some(Instant::now());
            delay
        })
    }

    /// Relaxes the domain's delay after a response that was not rate limited
    pub fn record_success(&self, domain: &str) {
        self.with_domain(domain, |state| state.record_success(&self.config));
    }

    /// Snapshot of a domain's state, if it has been seen
    pub fn domain_state(&self, domain: &str) -> Option<DomainState> {
        self.domains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(domain)
            .cloned()
    }

    /// Runs `attempt` for `url` under the domain's pacing, retrying on
    /// rate-limit responses
    ///
    /// At most `max_retries + 1` attempts are made. When every one of them is
    /// rate limited the outcome carries [`TaskError::RateLimitExhausted`].
    pub async fn run<F, Fut>(&self, url: &str, mut attempt: F) -> RateLimitedFetch
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult>,
    {
        let domain = domain_of(url).unwrap_or_default();
        let mut backoffs = Vec::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.wait_for_slot(&domain).await;
            let result = attempt().await;

            if !self.is_rate_limit_status(result.status_code) {
                self.record_success(&domain);
                return RateLimitedFetch {
                    result,
                    attempts,
                    backoffs,
                    error: None,
                };
            }

            let delay = self.record_rate_limited(&domain);
            if attempts > self.config.max_retries {
                tracing::warn!(
                    "Giving up on {} after {} rate-limited attempts",
                    url,
                    attempts
                );
                let status = result.status_code;
                return RateLimitedFetch {
                    result,
                    attempts,
                    backoffs,
                    error: Some(TaskError::RateLimitExhausted {
                        domain,
                        attempts,
                        status,
                    }),
                };
            }

            backoffs.push(delay);
            tracing::warn!(
                "{} answered {} for {}, backing off {:?} (attempt {}/{})",
                domain,
                result.status_code,
                url,
                delay,
                attempts,
                self.config.max_retries + 1
            );
        }
    }
}
