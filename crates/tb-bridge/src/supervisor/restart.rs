//! Fixed-delay restart policy

use std::time::Duration;

use tb_core::config::RestartConfig;

/// Decides whether and when a stopped client is rebuilt
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Delay before every restart
    delay: Duration,
    /// Consecutive failures tolerated; unbounded when `None`
    max_restarts: Option<u32>,
    /// Restarts since the last session that reached the open state
    failures: u32,
}

impl RestartPolicy {
    /// Create a new policy from configuration
    pub fn from_config(config: &RestartConfig) -> Self {
        Self::new(config.delay, config.max_restarts)
    }

    /// Create a new policy with custom parameters
    pub fn new(delay: Duration, max_restarts: Option<u32>) -> Self {
        Self {
            delay,
            max_restarts,
            failures: 0,
        }
    }

    /// Record a stopped client and get the delay before the next one.
    ///
    /// `established` says whether the stopped client ever opened its
    /// channel; a client that did resets the failure count. Returns `None`
    /// once the limit is exceeded.
    pub fn next_delay(&mut self, established: bool) -> Option<Duration> {
        if established {
            self.failures = 0;
        }
        self.failures = self.failures.saturating_add(1);

        match self.max_restarts {
            Some(max) if self.failures > max => None,
            _ => Some(self.delay),
        }
    }

    /// Consecutive failures recorded so far
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_fixed() {
        let mut policy = RestartPolicy::new(Duration::from_millis(1000), None);

        let d1 = policy.next_delay(false);
        let d2 = policy.next_delay(false);
        let d3 = policy.next_delay(false);

        assert_eq!(d1, Some(Duration::from_millis(1000)));
        assert_eq!(d2, Some(Duration::from_millis(1000)));
        assert_eq!(d3, Some(Duration::from_millis(1000)));
        assert_eq!(policy.failures(), 3);
    }

    #[test]
    fn test_limit_exceeded() {
        let mut policy = RestartPolicy::new(Duration::from_millis(10), Some(2));

        assert!(policy.next_delay(false).is_some());
        assert!(policy.next_delay(false).is_some());
        assert!(policy.next_delay(false).is_none());
        assert_eq!(policy.failures(), 3);
    }

    #[test]
    fn test_established_session_resets_count() {
        let mut policy = RestartPolicy::new(Duration::from_millis(10), Some(1));

        assert!(policy.next_delay(false).is_some());
        // Session opened before it stopped; streak starts over
        assert!(policy.next_delay(true).is_some());
        assert!(policy.next_delay(false).is_none());
    }

    #[test]
    fn test_zero_restarts_allowed() {
        let mut policy = RestartPolicy::new(Duration::from_millis(10), Some(0));
        assert!(policy.next_delay(true).is_none());
    }
}
