use crate::resilience::FailurePolicy;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub resilience: ResilienceSettings,
    pub logging: LoggingConfig,
    pub dataset: DatasetConfig,
}

/// Fake REST backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:4000")
    pub listen_addr: String,

    /// Artificial delay before every response
    pub latency_ms: u64,

    /// Fraction of requests answered with 503
    pub failure_rate: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4000".to_string(),
            latency_ms: 0,
            failure_rate: 0.0,
        }
    }
}

/// HTTP client used by the REST provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL; defaults to the fake server's address
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: default_request_timeout(),
            max_retries: 1,
        }
    }
}

/// Resilient call wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    pub max_retries: u32,

    /// "mask" or "propagate"
    pub policy: FailurePolicy,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout(),
            max_retries: 1,
            policy: FailurePolicy::Mask,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,

    pub json: bool,

    /// Minimum gap between two log lines for the same call
    pub throttle_window_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            throttle_window_ms: 2000,
        }
    }
}

/// Seeded demo dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub seed: u64,
    pub customers: usize,
    pub products: usize,
    pub orders: usize,
    pub reviews: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            customers: 50,
            products: 40,
            orders: 60,
            reviews: 40,
        }
    }
}

fn default_request_timeout() -> u64 {
    2000
}

fn default_call_timeout() -> u64 {
    3000
}
