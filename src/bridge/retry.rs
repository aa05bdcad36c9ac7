use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use tokio::time::sleep;

use super::{CancellationSignal, RunReport};
use crate::error::{Error, Result};
use crate::native::TransferSettings;

/// An attempt that failed after this few progress notifications probably
/// never got the transfer going.
const SUSPICIOUS_PROGRESS_EVENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_between_attempts: Duration,
    pub timeout_per_attempt: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_between_attempts: Duration::from_millis(1000),
            timeout_per_attempt: None,
        }
    }
}

/// Parameters of one attempt handed to the attempt closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based.
    pub number: u32,
    pub timeout: Option<Duration>,
    pub settings: TransferSettings,
}

/// Whether the link proved too flaky for the configured transfer settings
/// before starting attempt number `attempt`.
pub fn is_connection_unstable(attempt: u32, max_attempts: u32, suspicious_failures: u32) -> bool {
    attempt >= 2 && (attempt == max_attempts || (attempt >= 3 && suspicious_failures >= 2))
}

/// Drives `attempt` until it succeeds, fails for good, or the policy runs out
/// of attempts.
///
/// Only failures the device may recover from are retried (see
/// [`Error::is_retryable`]). Once `cancellation` is armed, during an attempt
/// or in the delay after it, the loop stops with [`Error::Cancelled`],
/// whatever that attempt resolved with.
pub async fn run_with_retries<T, F, Fut>(
    resource: &str,
    policy: &RetryPolicy,
    settings: TransferSettings,
    cancellation: &CancellationSignal,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = RunReport<T>>,
{
    if policy.max_attempts == 0 {
        return Err(Error::InvalidArgument(
            "max_attempts must be greater than zero".into(),
        ));
    }

    let mut settings = settings;
    let mut suspicious_failures = 0;
    let mut failsafe = false;
    let mut number = 1;

    loop {
        if cancellation.is_armed() {
            return Err(super::cancelled(cancellation.reason()));
        }

        if !failsafe && is_connection_unstable(number, policy.max_attempts, suspicious_failures) {
            failsafe = true;
            settings = TransferSettings::FAILSAFE;
            warn!(
                "Attempt #{} on '{}': connection is too unstable, subsequent attempts use fail-safe settings {:?}",
                number, resource, settings
            );
        }

        let report = attempt(Attempt {
            number,
            timeout: policy.timeout_per_attempt,
            settings,
        })
        .await;

        let err = match report.outcome {
            Ok(value) => {
                if number > 1 {
                    info!("'{}' succeeded on attempt {}/{}", resource, number, policy.max_attempts);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if report.cancellation_requested || cancellation.is_armed() {
            if err.is_cancellation() {
                return Err(err);
            }
            let reason = if report.cancellation_reason.is_empty() {
                cancellation.reason()
            } else {
                report.cancellation_reason
            };
            return Err(super::cancelled(reason));
        }

        if !err.is_retryable() {
            return Err(err);
        }

        if report.progress_events <= SUSPICIOUS_PROGRESS_EVENTS {
            suspicious_failures += 1;
        }

        if number >= policy.max_attempts {
            return Err(Error::AllAttemptsFailed {
                resource: resource.to_owned(),
                attempts: number,
                last: Box::new(err),
            });
        }

        warn!(
            "Attempt {}/{} on '{}' failed: {}",
            number, policy.max_attempts, resource, err
        );
        tokio::select! {
            _ = sleep(policy.delay_between_attempts) => {}
            _ = cancellation.armed() => {
                info!("'{}' cancelled while waiting for attempt {}", resource, number + 1);
                return Err(super::cancelled(cancellation.reason()));
            }
        }
        number += 1;
    }
}
