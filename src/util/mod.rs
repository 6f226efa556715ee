//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use std::time::Instant;

/// Installs a default tracing subscriber, ignoring an already-set one
pub fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Millisecond counter anchored to process start
///
/// All protocol timestamps are relative milliseconds from this clock; the
/// reassembly tracker's wraparound handling assumes nothing about its
/// origin.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Creates a clock anchored at now
    pub fn new() -> Self {
        MonotonicClock {
            epoch: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_is_monotone() {
        let clock = MonotonicClock::new();
        let first = clock.now_ms();
        std::thread::sleep(Duration::from_millis(5));
        let second = clock.now_ms();
        assert!(second >= first + 5);
    }
}
