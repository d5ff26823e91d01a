//! Per-key log rate limiting

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Allows one log line per key per window
#[derive(Debug)]
pub struct LogThrottle {
    window: Duration,
    last: DashMap<String, Instant>,
    suppressed: AtomicU64,
}

impl LogThrottle {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2);

    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: DashMap::new(),
            suppressed: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn should_log(&self, key: &str) -> bool {
        self.should_log_at(key, Instant::now())
    }

    /// True when `key` was never logged or its last line is strictly older than the window
    pub fn should_log_at(&self, key: &str, now: Instant) -> bool {
        let mut allowed = false;
        self.last
            .entry(key.to_string())
            .and_modify(|last| {
                if now.saturating_duration_since(*last) > self.window {
                    *last = now;
                    allowed = true;
                }
            })
            .or_insert_with(|| {
                allowed = true;
                now
            });

        if !allowed {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
        allowed
    }

    /// Lines dropped since creation or the last reset
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.last.clear();
        self.suppressed.store(0, Ordering::Relaxed);
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
