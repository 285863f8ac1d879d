//! Hierarchical configuration loading.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid max_save_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid check_timeout_ms: {0}. Cannot be 0")]
    InvalidCheckTimeout(u64),

    #[error("Invalid auto_approve_threshold: {0}. Cannot be 0")]
    InvalidThreshold(u32),

    #[error("Rules path cannot be empty")]
    EmptyRulesPath,

    #[error("State directory cannot be empty")]
    EmptyStateDir,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .stopgate/config.yaml (project config, created by init)
    /// 3. .stopgate/local.yaml (project local overrides, optional)
    /// 4. Environment variables (STOPGATE_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.stopgate/) so each
    /// supervised project carries its own rules and thresholds.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".stopgate/config.yaml"))
            .merge(Yaml::file(".stopgate/local.yaml"))
            .merge(Env::prefixed("STOPGATE_").split("__"))
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
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.rules_path.is_empty() {
            return Err(ConfigError::EmptyRulesPath);
        }

        if config.state.dir.is_empty() {
            return Err(ConfigError::EmptyStateDir);
        }

        if config.state.max_save_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.state.max_save_retries));
        }

        if config.state.initial_backoff_ms >= config.state.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.state.initial_backoff_ms,
                config.state.max_backoff_ms,
            ));
        }

        if config.checker.check_timeout_ms == 0 {
            return Err(ConfigError::InvalidCheckTimeout(config.checker.check_timeout_ms));
        }

        if config.escalation.auto_approve_threshold == 0 {
            return Err(ConfigError::InvalidThreshold(
                config.escalation.auto_approve_threshold,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
