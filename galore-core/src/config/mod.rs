pub mod types;

pub use types::*;

use crate::data::GeneratorOptions;
use crate::resilience::ResilienceConfig;
use crate::server::FakeServerConfig;
use anyhow::{Context, Result};
use reqwest::Url;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Prefix of environment overrides: `GALORE_<SECTION>__<KEY>`
pub const ENV_PREFIX: &str = "GALORE_";

impl Config {
    /// Load configuration from a TOML file, then apply `GALORE_*` environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        let text = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration {}", config_path.display()))?;

        let cfg = Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse configuration {}", config_path.display()))?
            .apply_overrides(env_vars())?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Result<Self> {
        let cfg = Self::default().apply_overrides(env_vars())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to deserialize configuration")
    }

    /// Apply `GALORE_SECTION__KEY=value` pairs; other variables are ignored
    pub fn apply_overrides<I, K, V>(self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = toml::Value::try_from(&self).context("Failed to serialize configuration")?;
        let mut applied = 0usize;

        for (key, value) in vars {
            let key = key.as_ref();
            let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path: Vec<String> = rest.split("__").map(str::to_ascii_lowercase).collect();
            let [section, field] = path.as_slice() else {
                anyhow::bail!("Invalid override '{}', expected {}SECTION__KEY", key, ENV_PREFIX);
            };

            let table = root
                .get_mut(section.as_str())
                .and_then(toml::Value::as_table_mut)
                .with_context(|| format!("Unknown configuration section '{}' in {}", section, key))?;
            table.insert(field.clone(), override_value(value.as_ref()));
            applied += 1;
        }

        if applied == 0 {
            return Ok(self);
        }
        debug!("Applied {} configuration overrides from the environment", applied);
        root.try_into()
            .context("Failed to apply environment overrides")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.server
            .listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server.listen_addr '{}'", self.server.listen_addr))?;

        if !(0.0..=1.0).contains(&self.server.failure_rate) {
            anyhow::bail!(
                "server.failure_rate must be within [0, 1], got {}",
                self.server.failure_rate
            );
        }

        if let Some(base_url) = &self.client.base_url {
            Url::parse(base_url)
                .with_context(|| format!("Invalid client.base_url '{}'", base_url))?;
        }

        if self.client.request_timeout_ms == 0 {
            anyhow::bail!("client.request_timeout_ms must be positive");
        }

        if self.resilience.call_timeout_ms == 0 {
            anyhow::bail!("resilience.call_timeout_ms must be positive");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.logging.level,
                valid_log_levels
            );
        }

        Ok(())
    }

    pub fn server_config(&self) -> Result<FakeServerConfig> {
        Ok(FakeServerConfig {
            listen_addr: self
                .server
                .listen_addr
                .parse()
                .with_context(|| format!("Invalid server.listen_addr '{}'", self.server.listen_addr))?,
            latency: Duration::from_millis(self.server.latency_ms),
            failure_rate: self.server.failure_rate,
        })
    }

    /// Configured base URL, or the address the fake server actually bound
    pub fn base_url(&self, server_addr: SocketAddr) -> Result<Url> {
        let raw = match &self.client.base_url {
            Some(url) => url.clone(),
            None => format!("http://{}", server_addr),
        };
        Url::parse(&raw).with_context(|| format!("Invalid backend URL '{}'", raw))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.client.request_timeout_ms)
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.logging.throttle_window_ms)
    }

    pub fn resilience_config(&self) -> ResilienceConfig {
        ResilienceConfig {
            call_timeout: Duration::from_millis(self.resilience.call_timeout_ms),
            max_retries: self.resilience.max_retries,
            policy: self.resilience.policy,
        }
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            seed: self.dataset.seed,
            customers: self.dataset.customers,
            products: self.dataset.products,
            orders: self.dataset.orders,
            reviews: self.dataset.reviews,
            ..Default::default()
        }
    }
}

/// Process environment, skipping variables that are not valid UTF-8
fn env_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Environment values are typed the way TOML would read them, falling back to strings
fn override_value(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return toml::Value::Integer(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(raw.to_string())
}
