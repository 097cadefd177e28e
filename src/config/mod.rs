//! Typed configuration.
//!
//! [`HerdConfig`] holds the engine knobs. [`Config`] is the operator-facing
//! configuration for the binary, loaded once from environment variables.

use crate::error::{Error, Result};

pub const DEFAULT_ADDR: &str = "127.0.0.1:2112";

/// Engine settings fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HerdConfig {
    /// Number of workers spawned by `start()`.
    pub herd_size: usize,
    /// Retry loopbacks allowed before a `Retry` outcome becomes `Failure`.
    pub max_retries: u32,
}

impl Default for HerdConfig {
    fn default() -> Self {
        Self {
            herd_size: 1,
            max_retries: 0,
        }
    }
}

impl HerdConfig {
    pub fn herd_size(mut self, n: usize) -> Self {
        self.herd_size = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub herd: HerdConfig,
    /// Address the control surface listens on.
    pub addr: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = HerdConfig::default();
        Ok(Self {
            herd: HerdConfig {
                herd_size: parsed_var("HERD_SIZE")?.unwrap_or(defaults.herd_size),
                max_retries: parsed_var("HERD_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            },
            addr: std::env::var("HERD_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(None),
    }
}
