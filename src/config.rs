//! Global configuration parsing and validation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::{AppError, Result};

/// Environment variable that overrides `db_path` from the TOML file.
pub const DB_PATH_ENV: &str = "LEAD_RESPONDER_DB_PATH";

/// Conversation loader tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LoaderConfig {
    /// Lifetime of a cached conversation snapshot.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Retries after the initial attempt before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt timeout for a store query.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Delay before the first retry; doubles on each subsequent retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any single backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: default_cache_ttl_ms(),
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl LoaderConfig {
    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Per-attempt timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_cache_ttl_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

/// Decision engine tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DecisionConfig {
    /// Number of past decisions retained for insights.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// First business hour (inclusive, local time).
    #[serde(default = "default_business_hours_start")]
    pub business_hours_start: u32,
    /// Last business hour (exclusive, local time).
    #[serde(default = "default_business_hours_end")]
    pub business_hours_end: u32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            business_hours_start: default_business_hours_start(),
            business_hours_end: default_business_hours_end(),
        }
    }
}

fn default_history_capacity() -> usize {
    100
}

fn default_business_hours_start() -> u32 {
    8
}

fn default_business_hours_end() -> u32 {
    18
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/lead-responder.db")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Location of the `SQLite` conversation database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Conversation loader settings.
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Decision engine settings.
    #[serde(default)]
    pub decision: DecisionConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            loader: LoaderConfig::default(),
            decision: DecisionConfig::default(),
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

    /// Parse configuration from a TOML string, apply environment
    /// overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Path to the `SQLite` database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var(DB_PATH_ENV) {
            if !path.trim().is_empty() {
                info!(db_path = %path, "db_path overridden from environment");
                self.db_path = PathBuf::from(path);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(AppError::Config("db_path must not be empty".into()));
        }

        if self.loader.timeout_ms == 0 {
            return Err(AppError::Config(
                "loader.timeout_ms must be greater than zero".into(),
            ));
        }

        if self.loader.initial_backoff_ms > self.loader.max_backoff_ms {
            return Err(AppError::Config(
                "loader.initial_backoff_ms must not exceed loader.max_backoff_ms".into(),
            ));
        }

        if self.decision.history_capacity == 0 {
            return Err(AppError::Config(
                "decision.history_capacity must be greater than zero".into(),
            ));
        }

        let (start, end) = (
            self.decision.business_hours_start,
            self.decision.business_hours_end,
        );
        if start >= end || end > 24 {
            return Err(AppError::Config(format!(
                "business hours must satisfy start < end <= 24 (got {start}..{end})"
            )));
        }

        Ok(())
    }
}
