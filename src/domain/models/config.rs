use serde::{Deserialize, Serialize};

/// Main configuration structure for stopgate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Path to the rule definition file (YAML list of considerations)
    #[serde(default = "default_rules_path")]
    pub rules_path: String,

    /// State storage configuration
    #[serde(default)]
    pub state: StateConfig,

    /// Checker pipeline configuration
    #[serde(default)]
    pub checker: CheckerConfig,

    /// Escalation configuration
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_rules_path() -> String {
    ".stopgate/rules.yaml".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_path: default_rules_path(),
            state: StateConfig::default(),
            checker: CheckerConfig::default(),
            escalation: EscalationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Turn-state persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StateConfig {
    /// Directory holding per-session state, redirect, and diagnostic files
    #[serde(default = "default_state_dir")]
    pub dir: String,

    /// Maximum save attempts before abandoning a write
    #[serde(default = "default_save_retries")]
    pub max_save_retries: u32,

    /// Initial backoff between save attempts in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff between save attempts in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_state_dir() -> String {
    ".stopgate/state".to_string()
}

const fn default_save_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            max_save_retries: default_save_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Checker pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckerConfig {
    /// Wall-clock timeout for a single rule check in milliseconds
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

const fn default_check_timeout_ms() -> u64 {
    10_000
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self { check_timeout_ms: default_check_timeout_ms() }
    }
}

/// Escalation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EscalationConfig {
    /// Consecutive blocks before the gate force-approves
    #[serde(default = "default_auto_approve_threshold")]
    pub auto_approve_threshold: u32,
}

const fn default_auto_approve_threshold() -> u32 {
    10
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self { auto_approve_threshold: default_auto_approve_threshold() }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}
