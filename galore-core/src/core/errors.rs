//! Error types for data-access operations
//!
//! Every provider returns these. The resilient wrapper decides whether they
//! reach the caller or get replaced with fallback data.

use super::method::Method;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The call did not settle before its deadline
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The request never produced a response
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The response body or headers could not be interpreted
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("{resource} record {id} not found")]
    NotFound { resource: String, id: String },

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The asynchronous provider setup failed
    #[error("data provider setup failed: {0}")]
    Setup(String),

    /// Retry budget exhausted for this request key; no attempt was made
    #[error("request '{0}' is permanently failed")]
    PermanentlyFailed(String),

    /// The provider panicked while serving the call
    #[error("provider panicked: {0}")]
    Panicked(String),

    /// A provider answered with a result shape that does not match the method
    #[error("unexpected reply shape for {method}")]
    UnexpectedReply { method: Method },
}

impl ProviderError {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        ProviderError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether a later identical attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } | ProviderError::Transport { .. } => true,
            ProviderError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
