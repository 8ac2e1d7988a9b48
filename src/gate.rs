//! Backend connectivity gate
//!
//! Probes the backend with a cheap read until it answers, backing off a
//! little longer after every failed attempt.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::api::HttpFetch;
use crate::config::AppConfig;

/// Retry configuration for the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum probe attempts
    pub max_attempts: u32,
    /// Delay unit; attempt `k` is followed by a `base_delay * k` pause
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Pause after failed attempt `attempt` (1-based). Not capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Tracks whether the backend was reachable the last time we looked
#[derive(Debug, Clone)]
pub struct ConnectivityGate {
    policy: RetryPolicy,
    available: bool,
}

impl ConnectivityGate {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            available: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Probe `probe_url` until it yields a non-empty body or the attempts run
    /// out. Blocks the caller for the cumulative backoff.
    pub fn probe<F: HttpFetch + ?Sized>(&mut self, fetch: &F, probe_url: &str, operation: &str) -> bool {
        let max = self.policy.max_attempts;

        for attempt in 1..=max {
            match fetch.get(probe_url) {
                Ok(body) if !body.is_empty() => {
                    info!("Backend connection established on attempt {}", attempt);
                    self.available = true;
                    return true;
                }
                _ => {}
            }

            if attempt < max {
                let delay = self.policy.backoff_delay(attempt);
                warn!(
                    "Backend not ready for {}, attempt {}/{}, retrying in {}ms...",
                    operation,
                    attempt,
                    max,
                    delay.as_millis()
                );
                std::thread::sleep(delay);
            }
        }

        error!("Backend unavailable for {} after {} attempts", operation, max);
        self.available = false;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, BASE_URL};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(6000));
        assert_eq!(policy.backoff_delay(9), Duration::from_millis(18000));
    }

    #[test]
    fn test_probe_succeeds_on_first_answer() {
        let fetch = MockFetcher::new().with("/api/providers", r#"{"providers":[]}"#);
        let mut gate = ConnectivityGate::new(instant_policy(5));
        let url = format!("{}/api/providers", BASE_URL);

        assert!(gate.probe(&fetch, &url, "initialization"));
        assert!(gate.is_available());
        assert_eq!(fetch.requests().len(), 1);
    }

    #[test]
    fn test_probe_exhausts_attempts() {
        let fetch = MockFetcher::new();
        let mut gate = ConnectivityGate::new(instant_policy(4));
        let url = format!("{}/api/providers", BASE_URL);

        assert!(!gate.probe(&fetch, &url, "initialization"));
        assert!(!gate.is_available());
        assert_eq!(fetch.requests().len(), 4);
    }

    #[test]
    fn test_probe_sleeps_between_attempts() {
        let fetch = MockFetcher::new();
        let mut gate = ConnectivityGate::new(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(20),
        });
        let url = format!("{}/api/providers", BASE_URL);

        let started = std::time::Instant::now();
        assert!(!gate.probe(&fetch, &url, "initialization"));
        // 20ms after attempt 1, 40ms after attempt 2, none after the last
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(fetch.requests().len(), 3);
    }

    #[test]
    fn test_empty_body_counts_as_failure() {
        let fetch = MockFetcher::new().with("/api/providers", "");
        let mut gate = ConnectivityGate::new(instant_policy(3));
        let url = format!("{}/api/providers", BASE_URL);

        assert!(!gate.probe(&fetch, &url, "stream playback"));
        assert_eq!(fetch.requests().len(), 3);
    }

    #[test]
    fn test_available_flag_drops_after_failed_reprobe() {
        let fetch = MockFetcher::new().with("/api/providers", "{}");
        let mut gate = ConnectivityGate::new(instant_policy(2));
        let url = format!("{}/api/providers", BASE_URL);
        assert!(gate.probe(&fetch, &url, "initialization"));

        fetch.remove("/api/providers");
        assert!(!gate.probe(&fetch, &url, "stream playback"));
        assert!(!gate.is_available());
    }

    #[test]
    fn test_config_never_yields_zero_attempts() {
        let mut config = AppConfig::default();
        config.max_retries = 0;
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }
}
