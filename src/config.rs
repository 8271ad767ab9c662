//! Configuration structures supplied by the embedding application.
//!
//! The core interprets [`Timer`] and [`CronConfig`] itself; [`PullConfig`]
//! and [`PushConfig`] are hints forwarded verbatim to collaborators that
//! implement the pull/push capabilities. The core never retries on its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interval-mode scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timer {
    /// Time between successive runs.
    pub interval: Duration,
    /// Overall deadline for the scheduled loop. `None` means unbounded.
    pub timeout: Option<Duration>,
}

impl Timer {
    /// Creates a timer with the given interval and no overall deadline.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Sets an overall deadline for the scheduled loop.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Cron-mode scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    /// Standard five-field cron expression.
    pub schedule: String,
    /// When false, scheduled execution degrades to a single run.
    pub enabled: bool,
}

impl CronConfig {
    /// Creates an enabled cron configuration from an expression.
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            enabled: true,
        }
    }

    /// Enables or disables scheduled execution.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Hints passed to a source's pull capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Preferred number of records per pull request.
    pub batch_size: usize,
    /// Retry budget for the collaborator; the core does not retry.
    pub max_retries: u32,
    /// Delay between collaborator retries.
    pub retry_delay: Duration,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl PullConfig {
    /// Creates a pull configuration with the given batch size.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Default::default()
        }
    }

    /// Sets the collaborator retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay between collaborator retries.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Hints passed to a sink's push capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Preferred number of records per push request.
    pub batch_size: usize,
    /// Preferred flush cadence for the collaborator.
    pub flush_interval: Duration,
    /// Named retry strategy, uninterpreted by the core.
    pub retry_strategy: String,
    /// Retry budget for the collaborator; the core does not retry.
    pub max_retries: u32,
    /// Backoff multiplier for the collaborator's retry strategy.
    pub backoff_factor: f64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            retry_strategy: "exponential".to_string(),
            max_retries: 3,
            backoff_factor: 2.0,
        }
    }
}

impl PushConfig {
    /// Creates a push configuration with the given batch size.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Default::default()
        }
    }

    /// Sets the preferred flush cadence.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Sets the named retry strategy.
    pub fn with_retry_strategy(mut self, retry_strategy: impl Into<String>) -> Self {
        self.retry_strategy = retry_strategy.into();
        self
    }

    /// Sets the collaborator retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_defaults_to_unbounded() {
        let timer = Timer::new(Duration::from_millis(50));
        assert_eq!(timer.interval, Duration::from_millis(50));
        assert!(timer.timeout.is_none());

        let bounded = timer.with_timeout(Duration::from_secs(1));
        assert_eq!(bounded.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_cron_config_builder() {
        let cron = CronConfig::new("*/5 * * * *");
        assert!(cron.enabled);

        let disabled = cron.with_enabled(false);
        assert!(!disabled.enabled);
        assert_eq!(disabled.schedule, "*/5 * * * *");
    }

    #[test]
    fn test_pull_config_defaults() {
        let pull = PullConfig::default();
        assert_eq!(pull.batch_size, 100);
        assert_eq!(pull.max_retries, 3);

        let tuned = PullConfig::new(10)
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(10));
        assert_eq!(tuned.batch_size, 10);
        assert_eq!(tuned.max_retries, 1);
        assert_eq!(tuned.retry_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_push_config_builder() {
        let push = PushConfig::new(2)
            .with_flush_interval(Duration::from_millis(100))
            .with_retry_strategy("linear")
            .with_max_retries(5)
            .with_backoff_factor(1.5);
        assert_eq!(push.batch_size, 2);
        assert_eq!(push.flush_interval, Duration::from_millis(100));
        assert_eq!(push.retry_strategy, "linear");
        assert_eq!(push.max_retries, 5);
        assert!((push.backoff_factor - 1.5).abs() < f64::EPSILON);
    }
}
