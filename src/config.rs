//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, Result};

/// Configurable timeout values (seconds) for blocking checkpoint waits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Budget and quality checkpoint timeout.
    #[serde(default = "default_checkpoint_seconds")]
    pub checkpoint_seconds: u64,
    /// Final review checkpoint timeout.
    #[serde(default = "default_final_review_seconds")]
    pub final_review_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            checkpoint_seconds: default_checkpoint_seconds(),
            final_review_seconds: default_final_review_seconds(),
        }
    }
}

fn default_checkpoint_seconds() -> u64 {
    15
}

fn default_final_review_seconds() -> u64 {
    15
}

/// Cost accounting configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CostConfig {
    /// Per-token rate applied on top of the complexity base cost.
    #[serde(default = "default_per_token_rate")]
    pub per_token_rate: f64,
    /// Fraction of the budget limit at which the budget checkpoint fires.
    #[serde(default = "default_budget_threshold")]
    pub budget_threshold: f64,
    /// Budget limit applied when the request does not carry one.
    #[serde(default = "default_budget_limit")]
    pub default_budget_limit: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            per_token_rate: default_per_token_rate(),
            budget_threshold: default_budget_threshold(),
            default_budget_limit: default_budget_limit(),
        }
    }
}

fn default_per_token_rate() -> f64 {
    0.001
}

fn default_budget_threshold() -> f64 {
    0.8
}

fn default_budget_limit() -> f64 {
    25.0
}

/// Delegate routing configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub struct DelegateConfig {
    /// Remote worker endpoint for the HTTP adapter. When absent, all
    /// tiers are served by the in-process scripted adapter.
    #[serde(default)]
    pub http_endpoint: Option<String>,
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".mission-relay")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Directory holding the `SQLite` database file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// HTTP port for the mission API.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Timeout configuration for blocking checkpoint waits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Cost accounting settings.
    #[serde(default)]
    pub cost: CostConfig,
    /// Delegate routing settings.
    #[serde(default)]
    pub delegate: DelegateConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            timeouts: TimeoutConfig::default(),
            cost: CostConfig::default(),
            delegate: DelegateConfig::default(),
        }
    }
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

    /// Derived path for the persisted `SQLite` database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("missions.db")
    }

    fn validate(&self) -> Result<()> {
        if self.cost.per_token_rate < 0.0 {
            return Err(AppError::Config(
                "cost.per_token_rate must not be negative".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.cost.budget_threshold) {
            return Err(AppError::Config(
                "cost.budget_threshold must be within 0.0..=1.0".into(),
            ));
        }

        if self.cost.default_budget_limit <= 0.0 {
            return Err(AppError::Config(
                "cost.default_budget_limit must be positive".into(),
            ));
        }

        if self.timeouts.checkpoint_seconds == 0 || self.timeouts.final_review_seconds == 0 {
            return Err(AppError::Config(
                "timeouts must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
