//! Exponential backoff for probe retries and stream reconnects.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Upper bound on the delay between failing polls.
pub const POLL_BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Exponential backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Maximum delay between retries.
    pub max: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(3),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Creates a doubling schedule.
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
        }
    }

    /// Delay for the given attempt, 1-based. Attempt 0 waits nothing.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(attempt.saturating_sub(1).min(64) as i32);
        let delay_millis = (self.initial.as_millis() as f64 * factor).min(u64::MAX as f64) as u64;
        Duration::from_millis(delay_millis).min(self.max)
    }
}

/// Delay before the next poll after `failures` consecutive failed probes.
///
/// Never shorter than the regular interval. Backoff starts at the interval
/// and is capped at [`POLL_BACKOFF_CAP`] (or the interval, if larger).
#[must_use]
pub fn poll_delay(interval: Duration, failures: u32) -> Duration {
    let backoff = Backoff::new(interval, POLL_BACKOFF_CAP.max(interval));
    backoff.delay_for_attempt(failures).max(interval)
}

/// Sleeps for `duration` unless cancelled first. Returns false on cancel.
pub async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
