//! Retry policy for the batch delivery path.

use std::time::Duration;

/// Fixed-interval retry with an optional attempt cap.
///
/// The scheduler polls on `interval`. While the backlog is due and sends keep
/// failing it retries on every poll; `max_attempts` (when set) bounds the
/// number of consecutive failures before it pauses for `cooldown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub cooldown: Duration,
}

impl RetryPolicy {
    /// Polls at a quarter of `batch_interval`, retries without limit.
    pub fn for_batch_interval(batch_interval: Duration) -> Self {
        let interval = (batch_interval / 4).max(Duration::from_millis(1));
        Self {
            interval,
            max_attempts: None,
            cooldown: batch_interval,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Whether another attempt is allowed after `consecutive_failures`.
    pub fn allows_attempt(&self, consecutive_failures: u32) -> bool {
        match self.max_attempts {
            Some(max) => consecutive_failures < max,
            None => true,
        }
    }
}
