//! Current and peak tracked usage shared between the allocation ledger and
//! the analytics engine.
//!
//! The counters sit behind their own lock, separate from the ledger's record
//! map. The ledger never holds both locks at once.

use std::sync::{Mutex, MutexGuard};

/// Point-in-time copy of the usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub current: u64,
    pub peak: u64,
}

/// Thread-safe current/peak usage counters.
#[derive(Debug, Default)]
pub struct UsageTracker {
    inner: Mutex<UsageSnapshot>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, UsageSnapshot> {
        // Counters stay meaningful even if a holder panicked mid-update.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds `bytes` to current usage and raises the high-water mark if needed.
    pub fn add(&self, bytes: u64) {
        let mut usage = self.lock();
        usage.current = usage.current.saturating_add(bytes);
        if usage.current > usage.peak {
            usage.peak = usage.current;
        }
    }

    /// Removes `bytes` from current usage. The peak is left untouched.
    pub fn sub(&self, bytes: u64) {
        let mut usage = self.lock();
        usage.current = usage.current.saturating_sub(bytes);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        *self.lock()
    }

    pub fn current(&self) -> u64 {
        self.lock().current
    }

    pub fn peak(&self) -> u64 {
        self.lock().peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_high_water_mark() {
        let usage = UsageTracker::new();
        usage.add(400);
        usage.add(800);
        usage.sub(400);
        assert_eq!(usage.current(), 800);
        assert_eq!(usage.peak(), 1200);

        usage.add(100);
        assert_eq!(usage.snapshot(), UsageSnapshot { current: 900, peak: 1200 });
    }

    #[test]
    fn test_sub_saturates_at_zero() {
        let usage = UsageTracker::new();
        usage.add(10);
        usage.sub(50);
        assert_eq!(usage.current(), 0);
        assert_eq!(usage.peak(), 10);
    }
}
