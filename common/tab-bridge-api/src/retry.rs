//! A fixed-delay retry combinator, used for socket setup and upstream request writes.
use log::{debug, error, warn};
use std::{fmt::Display, future::Future, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Runs the operation until it succeeds, or the policy's attempts are exhausted.
///
/// Each failure is logged with the operation name.  The error from the final attempt is returned.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut run: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match run().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation, attempt);
                }

                return Ok(value);
            }
            Err(e) if attempt >= attempts => {
                error!("{} failed after {} attempts: {}", operation, attempt, e);
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "{} failed on attempt {} of {}: {}",
                    operation, attempt, attempts, e
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
