use std::time::Duration;

use crate::bridge::{RetryPolicy, DEFAULT_GRACE_PERIOD};
use crate::native::TransferSettings;

/// Per-client settings for running operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationConfig {
    /// Per attempt. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Only used by retrying operations (downloads).
    pub max_attempts: u32,
    pub delay_between_attempts: Duration,
    pub grace_period: Duration,
    pub transfer: TransferSettings,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_attempts: 10,
            delay_between_attempts: Duration::from_millis(1000),
            grace_period: DEFAULT_GRACE_PERIOD,
            transfer: TransferSettings::default(),
        }
    }
}

impl OperationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_delay_between_attempts(mut self, delay: Duration) -> Self {
        self.delay_between_attempts = delay;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_transfer_settings(mut self, settings: TransferSettings) -> Self {
        self.transfer = settings;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay_between_attempts: self.delay_between_attempts,
            timeout_per_attempt: self.timeout,
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_attempts == 0 {
            return Err("Maximum attempts must be greater than zero");
        }

        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err("Timeout must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OperationConfig::new();
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.delay_between_attempts, Duration::from_millis(1000));
        assert_eq!(config.grace_period, Duration::from_millis(2500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_feeds_the_retry_policy() {
        let policy = OperationConfig::new()
            .with_timeout(Duration::from_secs(30))
            .with_max_attempts(3)
            .with_delay_between_attempts(Duration::from_millis(10))
            .retry_policy();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout_per_attempt, Some(Duration::from_secs(30)));
        assert_eq!(policy.delay_between_attempts, Duration::from_millis(10));
    }

    #[test]
    fn rejects_degenerate_values() {
        assert!(OperationConfig::new().with_max_attempts(0).validate().is_err());
        assert!(OperationConfig::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
