//! Waiting for the host to come up.
//!
//! The host may still be starting when `stm` runs. Resource commands retry the
//! host readiness probe with capped exponential backoff and give up with
//! [`ClientError::HostNotReady`] instead of retrying forever. A refusal that
//! cannot change on retry ends the wait at once.

use std::time::Duration;

use model::{ClientError, ClientResult, RetryPolicy};
use tracing::{info, warn};
use transport::HostSession;

use crate::settings::HostReadySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl From<&HostReadySettings> for Backoff {
    fn from(settings: &HostReadySettings) -> Self {
        Self::new(
            settings.max_attempts,
            settings.initial_delay(),
            settings.max_delay(),
        )
    }
}

/// Probes the host until it answers or the attempts run out.
pub async fn wait_for_host(session: &HostSession, backoff: Backoff) -> ClientResult<()> {
    for attempt in 1..=backoff.max_attempts() {
        match session.refresh().await {
            Ok(()) => {
                if attempt > 1 {
                    info!(attempt, "Host is ready");
                }
                return Ok(());
            }
            Err(e) if e.retry_policy() == RetryPolicy::NonRetryable => {
                warn!(attempt, error = %e, "Host refused the session request");
                return Err(e);
            }
            Err(e) if attempt < backoff.max_attempts() => {
                let delay = backoff.delay_after(attempt);
                warn!(attempt, error = %e, ?delay, "Host not ready; retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => warn!(attempt, error = %e, "Host not ready; giving up"),
        }
    }
    Err(ClientError::HostNotReady {
        attempts: backoff.max_attempts(),
    })
}
