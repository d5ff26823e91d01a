//! Per-request-key failure tracking
//!
//! ```text
//!   FRESH ──attempt──► ATTEMPTING ──success──► FRESH (entry removed)
//!                          │  ▲
//!                       failure (failures <= max_retries)
//!                          │  │
//!                          ▼  │
//!                      ATTEMPTING
//!                          │
//!                       failure (failures > max_retries)
//!                          ▼
//!                  PERMANENTLY FAILED  (terminal until reset())
//! ```
//!
//! A permanently failed key short-circuits every later identical request to
//! fallback data. Each failure increments the key's counter under the map
//! entry lock; concurrent identical requests each count, so the threshold can
//! be reached sooner than a serialized count would predict.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Observable state of one request key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Never failed, or succeeded since the last failure
    Fresh,
    /// Failed, retries remain
    Attempting { failures: u32 },
    /// Retry budget exhausted; live attempts are skipped
    PermanentlyFailed { failures: u32 },
}

#[derive(Debug, Clone)]
struct PendingCall {
    failures: u32,
    permanently_failed: bool,
    last_failure: Instant,
}

/// Snapshot of tracker counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResilienceStats {
    pub tracked_keys: usize,
    pub permanently_failed_keys: usize,
    pub failures_recorded: u64,
    pub bypassed_calls: u64,
}

/// Failure tracker shared by the calls of one resilient layer
#[derive(Debug)]
pub struct ResilienceState {
    max_retries: u32,
    pending: DashMap<String, PendingCall>,
    failures_recorded: AtomicU64,
    bypassed_calls: AtomicU64,
}

impl ResilienceState {
    pub const DEFAULT_MAX_RETRIES: u32 = 1;

    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            pending: DashMap::new(),
            failures_recorded: AtomicU64::new(0),
            bypassed_calls: AtomicU64::new(0),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn state(&self, key: &str) -> KeyState {
        match self.pending.get(key) {
            None => KeyState::Fresh,
            Some(call) if call.permanently_failed => KeyState::PermanentlyFailed {
                failures: call.failures,
            },
            Some(call) => KeyState::Attempting {
                failures: call.failures,
            },
        }
    }

    pub fn is_permanently_failed(&self, key: &str) -> bool {
        matches!(self.state(key), KeyState::PermanentlyFailed { .. })
    }

    /// Check before a live attempt; counts the call when it must be skipped
    pub fn should_bypass(&self, key: &str) -> bool {
        if self.is_permanently_failed(key) {
            self.bypassed_calls.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Clear the key after a successful attempt
    ///
    /// Permanently failed keys stay failed even if a late in-flight attempt succeeds.
    pub fn record_success(&self, key: &str) {
        if self
            .pending
            .remove_if(key, |_, call| !call.permanently_failed)
            .is_some()
        {
            debug!("Request {} recovered, failure count cleared", key);
        }
    }

    /// Count a failed attempt and return the resulting state
    pub fn record_failure(&self, key: &str) -> KeyState {
        self.failures_recorded.fetch_add(1, Ordering::Relaxed);

        let mut call = self
            .pending
            .entry(key.to_string())
            .or_insert_with(|| PendingCall {
                failures: 0,
                permanently_failed: false,
                last_failure: Instant::now(),
            });
        call.failures = call.failures.saturating_add(1);
        call.last_failure = Instant::now();

        if call.permanently_failed {
            return KeyState::PermanentlyFailed {
                failures: call.failures,
            };
        }

        if call.failures > self.max_retries {
            call.permanently_failed = true;
            warn!(
                "Request {} permanently failed after {} attempts, serving fallback data from now on",
                key, call.failures
            );
            KeyState::PermanentlyFailed {
                failures: call.failures,
            }
        } else {
            debug!(
                "Request {} failed ({} of {} allowed)",
                key,
                call.failures,
                self.max_retries + 1
            );
            KeyState::Attempting {
                failures: call.failures,
            }
        }
    }

    /// Seconds since the key last failed
    pub fn since_last_failure(&self, key: &str) -> Option<f64> {
        self.pending
            .get(key)
            .map(|call| call.last_failure.elapsed().as_secs_f64())
    }

    /// Forget every key, e.g. at the start of a new session
    pub fn reset(&self) {
        let cleared = self.pending.len();
        self.pending.clear();
        self.failures_recorded.store(0, Ordering::Relaxed);
        self.bypassed_calls.store(0, Ordering::Relaxed);
        info!("Resilience state reset ({} tracked keys cleared)", cleared);
    }

    pub fn stats(&self) -> ResilienceStats {
        ResilienceStats {
            tracked_keys: self.pending.len(),
            permanently_failed_keys: self
                .pending
                .iter()
                .filter(|entry| entry.permanently_failed)
                .count(),
            failures_recorded: self.failures_recorded.load(Ordering::Relaxed),
            bypassed_calls: self.bypassed_calls.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResilienceState {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fresh_by_default() {
        let state = ResilienceState::default();
        assert_eq!(state.state("getList-customers"), KeyState::Fresh);
        assert!(!state.should_bypass("getList-customers"));
    }

    #[test]
    fn test_failure_then_success_returns_to_fresh() {
        let state = ResilienceState::new(1);
        assert_eq!(
            state.record_failure("k"),
            KeyState::Attempting { failures: 1 }
        );
        state.record_success("k");
        assert_eq!(state.state("k"), KeyState::Fresh);
    }

    #[test]
    fn test_exhausting_budget_is_terminal() {
        let state = ResilienceState::new(1);
        state.record_failure("k");
        assert_eq!(
            state.record_failure("k"),
            KeyState::PermanentlyFailed { failures: 2 }
        );

        // A late success does not revive the key
        state.record_success("k");
        assert!(state.should_bypass("k"));
        assert_eq!(state.stats().bypassed_calls, 1);
    }

    #[test]
    fn test_zero_retries_fails_on_first_error() {
        let state = ResilienceState::new(0);
        assert_eq!(
            state.record_failure("k"),
            KeyState::PermanentlyFailed { failures: 1 }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let state = ResilienceState::new(0);
        state.record_failure("getList-reviews");
        assert!(state.is_permanently_failed("getList-reviews"));
        assert!(!state.is_permanently_failed("getList-orders"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let state = ResilienceState::new(0);
        state.record_failure("a");
        state.record_failure("b");
        state.should_bypass("a");
        state.reset();

        assert_eq!(state.stats(), ResilienceStats::default());
        assert_eq!(state.state("a"), KeyState::Fresh);
    }

    #[test]
    fn test_concurrent_failures_reach_terminal_state() {
        let state = Arc::new(ResilienceState::new(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    state.record_failure("getOne-orders");
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            state.state("getOne-orders"),
            KeyState::PermanentlyFailed { failures: 8 }
        );
        assert_eq!(state.stats().failures_recorded, 8);
    }
}
