//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and setup code.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use galore_core::config::Config;
use galore_core::BackendKind;
use std::path::PathBuf;

/// Backend selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Fake REST server over HTTP
    Rest,
    /// Seeded dataset in-process
    Memory,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Rest => BackendKind::Rest,
            Backend::Memory => BackendKind::Memory,
        }
    }
}

/// Common CLI arguments for all binaries
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Configuration file (TOML); defaults plus GALORE_* overrides when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Backend the resolver builds
    #[arg(short, long, value_enum, default_value = "rest")]
    pub backend: Backend,

    /// Make every request to the fake server fail
    #[arg(long)]
    pub fail_upstream: bool,

    /// Extra latency per fake server request, in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Log level, overrides the configuration file
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl CommonArgs {
    /// Configuration with command-line flags applied on top
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::from_env()?,
        };

        if self.fail_upstream {
            config.server.failure_rate = 1.0;
        }
        if let Some(latency_ms) = self.latency_ms {
            config.server.latency_ms = latency_ms;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Initialize tracing/logging
pub fn init_logging(config: &Config) -> Result<()> {
    galore_core::utils::init_logger(&config.logging.level, config.logging.json)
}
