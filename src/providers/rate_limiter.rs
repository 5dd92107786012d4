//! Sliding-window rate limiter
//!
//! One limiter exists per credential. `acquire` serializes the
//! prune/wait/record sequence behind an async mutex so concurrent callers on
//! the same credential never observe more than `max_calls` recorded calls in
//! any trailing `period`. Limiters for different credentials share nothing.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window counter for a single credential
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter allowing `max_calls` per `period`
    pub fn new(max_calls: usize, period: Duration) -> Self {
        // Ensure at least 1 call per window
        let max_calls = max_calls.max(1);
        SlidingWindowLimiter {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until one more call fits in the window, then record it.
    ///
    /// Dropping the future while it waits records nothing; calls already
    /// recorded stay recorded.
    pub async fn acquire(&self) {
        let mut calls = self.calls.lock().await;

        loop {
            let now = Instant::now();
            Self::prune(&mut calls, now, self.period);

            if calls.len() < self.max_calls {
                calls.push_back(now);
                return;
            }

            // Window is full: wait for the oldest call to leave it, then re-check.
            let oldest = calls[0];
            let wait = (oldest + self.period).saturating_duration_since(now);
            debug!(wait_ms = wait.as_millis() as u64, "Rate limit window full, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of calls recorded within the trailing window
    pub async fn in_window(&self) -> usize {
        let mut calls = self.calls.lock().await;
        Self::prune(&mut calls, Instant::now(), self.period);
        calls.len()
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant, period: Duration) {
        while let Some(&oldest) = calls.front() {
            if now.duration_since(oldest) >= period {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}
