//! Global configuration parsing and validation.
//!
//! All tunables are supplied through a TOML file; every knob has a default
//! so a minimal config only names the input files and the driver command.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::retry::RetryPolicy;
use crate::{AppError, Result};

/// Orchestration-level knobs: staggering, admission, shutdown.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    /// Gap between consecutive session start times.
    #[serde(default = "default_stagger_seconds")]
    pub stagger_seconds: u64,
    /// Maximum sessions concurrently in the launching phase.
    #[serde(default = "default_max_launching")]
    pub max_launching: u32,
    /// How long an agent waits on admission before logging and re-queueing.
    #[serde(default = "default_admission_wait_seconds")]
    pub admission_wait_seconds: u64,
    /// Grace period for agents to report terminal on shutdown.
    #[serde(default = "default_shutdown_deadline_seconds")]
    pub shutdown_deadline_seconds: u64,
    /// Interval between status snapshot log lines.
    #[serde(default = "default_status_interval_seconds")]
    pub status_interval_seconds: u64,
}

fn default_stagger_seconds() -> u64 {
    30
}

fn default_max_launching() -> u32 {
    3
}

fn default_admission_wait_seconds() -> u64 {
    60
}

fn default_shutdown_deadline_seconds() -> u64 {
    30
}

fn default_status_interval_seconds() -> u64 {
    60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stagger_seconds: default_stagger_seconds(),
            max_launching: default_max_launching(),
            admission_wait_seconds: default_admission_wait_seconds(),
            shutdown_deadline_seconds: default_shutdown_deadline_seconds(),
            status_interval_seconds: default_status_interval_seconds(),
        }
    }
}

/// Health probing knobs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HealthConfig {
    /// Gap between probe completions for one session.
    #[serde(default = "default_probe_interval_seconds")]
    pub probe_interval_seconds: u64,
    /// Per-probe timeout; a timed-out probe is a failed sample.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
    /// Consecutive failed probes before Degraded escalates to Disconnected.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_probe_interval_seconds() -> u64 {
    30
}

fn default_probe_timeout_seconds() -> u64 {
    10
}

fn default_failure_threshold() -> u32 {
    3
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_seconds: default_probe_interval_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// Retry/backoff knobs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Launch attempts permitted before a session is declared failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff base delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Driver process configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DriverConfig {
    /// Session runner binary launched once per session.
    pub command: String,
    /// Default arguments for the runner.
    #[serde(default)]
    pub args: Vec<String>,
    /// Memory ceiling advertised to each session, in megabytes.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u32,
    /// Base remote-debugging port; session `i` gets `base + i`.
    #[serde(default)]
    pub debug_base_port: Option<u16>,
}

fn default_memory_limit_mb() -> u32 {
    512
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// File with one `identifier:secret` credential per line.
    pub credentials_path: PathBuf,
    /// File with one proxy URL per line, paired with credentials by order.
    pub proxies_path: PathBuf,
    /// Session runner settings.
    pub driver: DriverConfig,
    /// Orchestration knobs.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Health probing knobs.
    #[serde(default)]
    pub health: HealthConfig,
    /// Retry/backoff knobs.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Backoff policy derived from the retry section.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.orchestrator.max_launching == 0 {
            return Err(AppError::Config(
                "orchestrator.max_launching must be greater than zero".into(),
            ));
        }
        if self.health.failure_threshold == 0 {
            return Err(AppError::Config(
                "health.failure_threshold must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "retry.max_attempts must be greater than zero".into(),
            ));
        }
        if self.driver.command.trim().is_empty() {
            return Err(AppError::Config("driver.command must not be empty".into()));
        }
        Ok(())
    }
}
