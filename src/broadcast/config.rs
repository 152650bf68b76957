//! Broadcaster configuration

use std::time::Duration;

/// Retry policy for transient capture failures
///
/// The backoff doubles per consecutive failure, capped at `max_backoff`,
/// and resets on any successful capture.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failed captures tolerated before the broadcaster fails
    /// (0 = fail on the first error)
    pub budget: u32,

    /// Backoff after the first failure
    pub initial_backoff: Duration,

    /// Upper bound on the backoff interval
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Set the retry budget
    pub fn budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Set the initial backoff
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set the maximum backoff
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Backoff to sleep before retry `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        let backoff = self.initial_backoff.saturating_mul(1u32 << doublings);
        backoff.min(self.max_backoff)
    }
}

/// Configuration for a [`FrameBroadcaster`](super::FrameBroadcaster)
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Retry policy for `DeviceUnavailable` capture errors
    pub retry: RetryPolicy,

    /// Upper bound on published frames per second (None = source cadence)
    ///
    /// Implemented as a minimum interval between publishes, not a buffer.
    pub frame_rate_cap: Option<u32>,

    /// Capacity of the configuration mailbox
    pub control_queue_depth: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            frame_rate_cap: None,
            control_queue_depth: 8,
        }
    }
}

impl BroadcasterConfig {
    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cap the publish rate at `fps` frames per second
    pub fn frame_rate_cap(mut self, fps: u32) -> Self {
        self.frame_rate_cap = if fps > 0 { Some(fps) } else { None };
        self
    }

    /// Minimum interval between publishes, if capped
    ///
    /// A cap of zero means uncapped, even when the field is set directly.
    pub fn min_publish_interval(&self) -> Option<Duration> {
        match self.frame_rate_cap {
            Some(fps) if fps > 0 => Some(Duration::from_secs(1) / fps),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BroadcasterConfig::default();

        assert_eq!(config.retry.budget, 5);
        assert_eq!(config.frame_rate_cap, None);
        assert_eq!(config.min_publish_interval(), None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryPolicy::default()
            .initial_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_millis(350));

        assert_eq!(retry.backoff_for(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(350));
        assert_eq!(retry.backoff_for(10), Duration::from_millis(350));
    }

    #[test]
    fn test_frame_rate_cap_interval() {
        let config = BroadcasterConfig::default().frame_rate_cap(25);

        assert_eq!(config.min_publish_interval(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn test_zero_fps_means_uncapped() {
        let config = BroadcasterConfig::default().frame_rate_cap(0);

        assert_eq!(config.frame_rate_cap, None);

        // Direct field writes bypass the builder; the interval still guards.
        let config = BroadcasterConfig {
            frame_rate_cap: Some(0),
            ..BroadcasterConfig::default()
        };
        assert_eq!(config.min_publish_interval(), None);
    }
}
