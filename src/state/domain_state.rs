use crate::dispatch::RateLimitConfig;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Smallest delay a rate-limit backoff grows to, so a zero base delay still backs off
const MIN_BACKOFF: Duration = Duration::from_millis(100);

/// Tracks the pacing and backoff state of a domain during crawling
///
/// This structure maintains the per-domain information the rate limiter needs:
/// the current spacing between requests, the consecutive rate-limit failure
/// count, and when the most recent request slot was handed out.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Current spacing between consecutive requests to this domain
    pub current_delay: Duration,

    /// Consecutive rate-limited responses since the last success
    pub fail_count: u32,

    /// Time of the most recently reserved request slot
    pub last_slot: Option<Instant>,

    /// Number of requests made to this domain in the current crawl
    pub request_count: u64,

    /// Number of rate-limit responses seen from this domain
    pub rate_limited_count: u64,
}

impl DomainState {
    /// Creates a new DomainState with a random base delay
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            current_delay: sample_base_delay(config),
            fail_count: 0,
            last_slot: None,
            request_count: 0,
            rate_limited_count: 0,
        }
    }

    /// Reserves the next request slot and returns how long to wait for it
    ///
    /// The first request to a domain goes out immediately; every later one is
    /// spaced `current_delay` after the previously reserved slot.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        let slot = match self.last_slot {
            Some(last) => std::cmp::max(now, last + self.current_delay),
            None => now,
        };
        self.last_slot = Some(slot);
        self.request_count += 1;
        slot.saturating_duration_since(now)
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_slot?;
        let ready = last + self.current_delay;
        (ready > now).then(|| ready - now)
    }

    /// Records a rate-limited response and grows the delay
    ///
    /// The delay doubles with ±25% jitter and is capped at `max_delay`.
    /// Returns the new delay.
    pub fn record_rate_limited(&mut self, config: &RateLimitConfig) -> Duration {
        self.fail_count += 1;
        self.rate_limited_count += 1;

        let jitter = rand::thread_rng().gen_range(0.75..1.25);
        let grown = self.current_delay.mul_f64(2.0 * jitter).max(MIN_BACKOFF);
        self.current_delay = grown.max(self.current_delay).min(config.max_delay);
        self.current_delay
    }

    /// Records a non-rate-limited response, relaxing the delay toward the base range
    pub fn record_success(&mut self, config: &RateLimitConfig) {
        self.fail_count = 0;
        let relaxed = self.current_delay.mul_f64(0.75);
        self.current_delay = std::cmp::max(sample_base_delay(config), relaxed);
    }

    /// Returns true if the domain is currently backing off
    pub fn is_backing_off(&self) -> bool {
        self.fail_count > 0
    }
}

/// Draws a delay uniformly from the configured `[min, max)` base range
pub fn sample_base_delay(config: &RateLimitConfig) -> Duration {
    let (min, max) = config.base_delay;
    if min >= max {
        return min;
    }
    let secs = rand::thread_rng().gen_range(min.as_secs_f64()..max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> RateLimitConfig {
        RateLimitConfig {
            base_delay: (Duration::from_secs(1), Duration::from_secs(2)),
            max_delay: Duration::from_secs(10),
            max_retries: 3,
            rate_limit_codes: vec![429, 503],
        }
    }

    #[test]
    fn test_new_domain_state_delay_in_range() {
        let config = create_test_config();
        for _ in 0..50 {
            let state = DomainState::new(&config);
            assert!(state.current_delay >= Duration::from_secs(1));
            assert!(state.current_delay < Duration::from_secs(2));
            assert_eq!(state.fail_count, 0);
            assert!(state.last_slot.is_none());
        }
    }

    #[test]
    fn test_fixed_base_delay() {
        let mut config = create_test_config();
        config.base_delay = (Duration::from_millis(500), Duration::from_millis(500));
        assert_eq!(sample_base_delay(&config), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let config = create_test_config();
        let mut state = DomainState::new(&config);
        let now = Instant::now();
        assert_eq!(state.reserve(now), Duration::ZERO);
        assert_eq!(state.request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let mut config = create_test_config();
        config.base_delay = (Duration::from_secs(1), Duration::from_secs(1));
        let mut state = DomainState::new(&config);
        let now = Instant::now();

        assert_eq!(state.reserve(now), Duration::ZERO);
        assert_eq!(state.reserve(now), Duration::from_secs(1));
        assert_eq!(state.reserve(now), Duration::from_secs(2));
        assert_eq!(
            state.time_until_next_request(now),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = create_test_config();
        let mut state = DomainState::new(&config);

        let mut previous = state.current_delay;
        for _ in 0..10 {
            let next = state.record_rate_limited(&config);
            assert!(next >= previous);
            assert!(next <= config.max_delay);
            previous = next;
        }
        assert_eq!(state.current_delay, config.max_delay);
        assert_eq!(state.fail_count, 10);
        assert!(state.is_backing_off());
    }

    #[test]
    fn test_zero_base_delay_still_backs_off() {
        let mut config = create_test_config();
        config.base_delay = (Duration::ZERO, Duration::ZERO);
        let mut state = DomainState::new(&config);
        assert!(state.record_rate_limited(&config) >= MIN_BACKOFF);
    }

    #[test]
    fn test_success_resets_fail_count_and_relaxes() {
        let config = create_test_config();
        let mut state = DomainState::new(&config);
        state.record_rate_limited(&config);
        state.record_rate_limited(&config);
        let backed_off = state.current_delay;

        state.record_success(&config);
        assert_eq!(state.fail_count, 0);
        assert!(state.current_delay <= backed_off);
        assert!(state.current_delay >= Duration::from_secs(1));
    }
}
