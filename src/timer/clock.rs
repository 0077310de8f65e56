// src/timer/clock.rs — Wall-clock source for elapsed-time recovery

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Whole seconds elapsed between two epoch-millisecond stamps; 0 if `now` is earlier.
pub fn elapsed_secs(start_ms: i64, now_ms: i64) -> u64 {
    if now_ms <= start_ms {
        0
    } else {
        ((now_ms - start_ms) / 1000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_floors() {
        assert_eq!(elapsed_secs(0, 125_999), 125);
        assert_eq!(elapsed_secs(1_000, 1_999), 0);
    }

    #[test]
    fn test_elapsed_clock_skew_is_zero() {
        assert_eq!(elapsed_secs(10_000, 5_000), 0);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance_secs(5);
        assert_eq!(other.now_ms(), 6_000);
        other.set_ms(42);
        assert_eq!(clock.now_ms(), 42);
    }
}
