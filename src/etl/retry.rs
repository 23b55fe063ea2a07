//! Per-task retry policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry with a fixed delay between attempts
///
/// `max_attempts` counts the first try, so `1` means no retry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay_secs: u64) -> Self {
        Self {
            max_attempts,
            delay_secs,
        }
    }

    /// A single attempt, never retried
    pub const fn once() -> Self {
        Self::new(1, 0)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based)
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    /// One retry after a minute
    fn default() -> Self {
        Self::new(2, 60)
    }
}
