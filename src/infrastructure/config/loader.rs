use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Model name cannot be empty")]
    EmptyModelName,

    #[error("Model host cannot be empty")]
    EmptyModelHost,

    #[error("Invalid temperature: {0}. Must be between 0.0 and 2.0")]
    InvalidTemperature(f32),

    #[error("Invalid timeout for {0}: must be at least 1 second")]
    ZeroTimeout(&'static str),

    #[error("Invalid top_k: must be at least 1")]
    ZeroTopK,

    #[error("Invalid max_context_chars: must be at least 1")]
    ZeroContextBudget,

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Workspace root cannot be empty")]
    EmptyWorkspaceRoot,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .triad/config.yaml (project config)
    /// 3. .triad/local.yaml (project local overrides, optional)
    /// 4. Environment variables (TRIAD_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".triad/config.yaml"))
            .merge(Yaml::file(".triad/local.yaml"))
            .merge(Env::prefixed("TRIAD_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Model
        if config.model.name.trim().is_empty() {
            return Err(ConfigError::EmptyModelName);
        }
        if config.model.host.trim().is_empty() {
            return Err(ConfigError::EmptyModelHost);
        }
        if !(0.0..=2.0).contains(&config.model.temperature) {
            return Err(ConfigError::InvalidTemperature(config.model.temperature));
        }
        if config.model.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("model"));
        }

        // Index
        if config.index.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("index"));
        }
        if config.index.top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if config.index.max_context_chars == 0 {
            return Err(ConfigError::ZeroContextBudget);
        }

        if config.pipeline.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("pipeline"));
        }

        if config.workspace.root.trim().is_empty() {
            return Err(ConfigError::EmptyWorkspaceRoot);
        }

        // Rate limit and retry
        let rps = config.rate_limit.requests_per_second;
        if !rps.is_finite() || rps <= 0.0 || Duration::try_from_secs_f64(1.0 / rps).is_err() {
            return Err(ConfigError::InvalidRateLimit(rps));
        }
        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
