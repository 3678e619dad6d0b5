//! Wall-clock sources for code generation.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Source of absolute Unix time in milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Unix time derived from the tokio monotonic clock, anchored at a known
/// wall-clock instant.
///
/// Not affected by wall-clock jumps after the anchor, and follows tokio's
/// paused time in tests.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
    origin_millis: u64,
}

impl MonotonicClock {
    /// Anchor at the current system time.
    pub fn new() -> Self {
        Self::anchored_at(SystemClock.now_millis())
    }

    /// Anchor at an explicit Unix time.
    pub fn anchored_at(unix_millis: u64) -> Self {
        Self {
            origin: Instant::now(),
            origin_millis: unix_millis,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.origin_millis + self.origin.elapsed().as_millis() as u64
    }
}
