//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup, fails fast on values that do not parse or are out
//! of range. Unset engine variables fall back to defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Engine tuning. Immutable once the engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of queries that may hold a pool slot at once.
    pub pool_size: usize,
    /// Contention needed per unit of slowdown.
    pub cpu_divisor: usize,
    /// Deadline applied by [`crate::engine::QueryEngine::query`].
    pub query_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 20,
            cpu_divisor: 20,
            query_timeout_ms: 5000,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad engine config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".to_string()));
        }
        if self.cpu_divisor == 0 {
            return Err(Error::Config("cpu_divisor must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[derive(Debug)]
pub struct Config {
    pub engine: EngineConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            pool_size: optional_var("ENGINE_POOL_SIZE")?.unwrap_or(defaults.pool_size),
            cpu_divisor: optional_var("ENGINE_CPU_DIVISOR")?.unwrap_or(defaults.cpu_divisor),
            query_timeout_ms: optional_var("ENGINE_QUERY_TIMEOUT_MS")?
                .unwrap_or(defaults.query_timeout_ms),
        };
        engine.validate()?;

        Ok(Self {
            engine,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("environment variable {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
