//! Rate limiter for calls to the upstream extraction service.
//!
//! One explicit value constructed per batch and threaded through the
//! orchestration layer; no global counters. Invocation is strictly sequential,
//! so a plain counter plus a synchronous sleep is sufficient.

use std::time::Duration;
use tracing::info;

#[derive(Debug)]
pub struct RateLimiter {
    max_calls_per_window: u32,
    cooldown: Duration,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_calls_per_window: u32, cooldown: Duration) -> Self {
        Self {
            max_calls_per_window: max_calls_per_window.max(1),
            cooldown,
            count: 0,
        }
    }

    /// Counts one upstream call. Once the window is exhausted the call blocks
    /// for the cooldown and the counter resets, guaranteeing no more than
    /// `max_calls_per_window` calls within any cooldown window.
    pub fn check_and_wait(&mut self) {
        if self.count >= self.max_calls_per_window {
            info!(
                "Rate limit reached ({} calls), cooling down for {:?}...",
                self.count, self.cooldown
            );
            std::thread::sleep(self.cooldown);
            self.count = 0;
        }
        self.count += 1;
    }
}
