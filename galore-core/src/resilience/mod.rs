//! Resilience for the data-access path
//!
//! Keeps the back office usable when the backend is slow or down:
//! - Per-request-key failure tracking with a permanent-failure state
//! - Timeout-bounded calls that fall back to static records
//! - Structured events for every failure, masked or not

pub mod events;
pub mod state;
pub mod wrapper;

pub use events::{FailureEvent, FailureKind, FailureLog, FailureObserver, FailurePolicy};
pub use state::{KeyState, ResilienceState, ResilienceStats};
pub use wrapper::{ResilienceConfig, ResilientProvider};
