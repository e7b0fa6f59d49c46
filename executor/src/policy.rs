//! Retry policies for failed chunks.

use std::time::Duration;

/// Decides whether and when a failed chunk is re-issued.
pub trait RetryPolicy {
    /// Delay before the next attempt after `failures` consecutive failures
    /// of the same chunk, or `None` to give up.
    fn next_delay(&self, failures: u32) -> Option<Duration>;
}

/// Retry forever after a fixed delay.
///
/// Matches a remote network that is assumed to come back eventually: the
/// operator cancels by terminating the process.
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, _failures: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

/// Retry after a fixed delay, up to a total number of attempts.
#[derive(Clone, Copy, Debug)]
pub struct BoundedRetry {
    delay: Duration,
    max_attempts: u32,
}

impl BoundedRetry {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl RetryPolicy for BoundedRetry {
    fn next_delay(&self, failures: u32) -> Option<Duration> {
        (failures < self.max_attempts).then_some(self.delay)
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for &P {
    fn next_delay(&self, failures: u32) -> Option<Duration> {
        (**self).next_delay(failures)
    }
}
