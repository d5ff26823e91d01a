//! Structured failure events
//!
//! Masked failures never reach the caller, so they are reported here instead:
//! every observer registered on a resilient layer receives a [`FailureEvent`]
//! per failure, whether or not fallback data was substituted.

use crate::core::{Method, ProviderError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call lost its race against the deadline
    Timeout,
    /// The underlying provider or backend returned an error
    Upstream,
    /// The key is permanently failed; no attempt was made
    Bypassed,
    /// Asynchronous provider setup failed
    SetupFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Upstream => "upstream",
            FailureKind::Bypassed => "bypassed",
            FailureKind::SetupFailed => "setup_failed",
        }
    }
}

/// What happens to a failure once it is observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Substitute fallback data and return success
    #[default]
    Mask,
    /// Return the error to the caller
    Propagate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEvent {
    pub kind: FailureKind,
    pub method: Option<Method>,
    pub resource: String,
    pub key: String,
    pub message: String,
    /// Whether the caller received fallback data instead of the error
    pub masked: bool,
    pub at: SystemTime,
}

impl FailureEvent {
    pub fn new(kind: FailureKind, resource: &str, key: &str, error: &ProviderError) -> Self {
        Self {
            kind,
            method: None,
            resource: resource.to_string(),
            key: key.to_string(),
            message: error.to_string(),
            masked: true,
            at: SystemTime::now(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn masked(mut self, masked: bool) -> Self {
        self.masked = masked;
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub trait FailureObserver: Send + Sync {
    fn on_failure(&self, event: &FailureEvent);
}

impl<F> FailureObserver for F
where
    F: Fn(&FailureEvent) + Send + Sync,
{
    fn on_failure(&self, event: &FailureEvent) {
        self(event)
    }
}

/// Observer that keeps every event in memory
#[derive(Debug, Default)]
pub struct FailureLog {
    events: Mutex<Vec<FailureEvent>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FailureEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl FailureObserver for FailureLog {
    fn on_failure(&self, event: &FailureEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(kind: FailureKind) -> FailureEvent {
        FailureEvent::new(
            kind,
            "orders",
            "getList-orders",
            &ProviderError::Decode("truncated body".into()),
        )
        .with_method(Method::GetList)
    }

    #[test]
    fn test_failure_log_counts_by_kind() {
        let log = FailureLog::new();
        log.on_failure(&event(FailureKind::Timeout));
        log.on_failure(&event(FailureKind::Bypassed));
        log.on_failure(&event(FailureKind::Bypassed));

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(FailureKind::Bypassed), 2);
        assert_eq!(log.count(FailureKind::SetupFailed), 0);
    }

    #[test]
    fn test_closure_observer() {
        let seen = AtomicUsize::new(0);
        let observer = |_: &FailureEvent| {
            seen.fetch_add(1, Ordering::Relaxed);
        };
        observer.on_failure(&event(FailureKind::Upstream));
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_event_json() {
        let json = event(FailureKind::Timeout).masked(false).to_json().unwrap();
        assert!(json.contains("\"kind\":\"timeout\""));
        assert!(json.contains("\"method\":\"getList\""));
        assert!(json.contains("\"masked\":false"));
    }
}
