//! Clock abstraction
//!
//! Heartbeat and liveness logic takes time through this trait so tests can
//! advance it by hand instead of sleeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time source for liveness decisions
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;

    /// Monotonic timestamp in milliseconds, for measuring intervals
    fn monotonic_ms(&self) -> u64 {
        self.now_ms()
    }
}

/// Production clock backed by the system time sources
#[derive(Debug, Clone)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn monotonic_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for tests
#[derive(Debug, Default)]
pub struct MockClock {
    ms: AtomicU64,
}

impl MockClock {
    pub fn new(initial_ms: u64) -> Self {
        Self {
            ms: AtomicU64::new(initial_ms),
        }
    }

    /// Advance time by the given milliseconds
    pub fn advance(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the absolute time
    pub fn set(&self, ms: u64) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new(1000);
        assert_eq!(clock.now_ms(), 1000);
        assert_eq!(clock.monotonic_ms(), 1000);

        clock.advance(500);
        assert_eq!(clock.now_ms(), 1500);

        clock.set(100);
        assert_eq!(clock.now_ms(), 100);
    }

    #[test]
    fn test_wall_clock_monotonic_is_small() {
        // Monotonic time is measured from construction, not from the epoch.
        let clock = WallClock::new();
        assert!(clock.monotonic_ms() < 60_000);
        assert!(clock.now_ms() > 1_600_000_000_000);
    }
}
