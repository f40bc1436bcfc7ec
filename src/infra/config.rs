// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::errors::ForesightError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How sequence patterns are matched against the trailing action history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMatch {
    /// The pattern's leading (n-1) kinds must equal the last (n-1) kinds.
    Full,
    /// The longest leading run of the pattern that ends the history wins.
    #[default]
    Prefix,
}

/// Tunables for the predictive engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_stored_actions: usize,
    pub max_persisted_actions: usize,
    pub min_actions_for_prediction: usize,
    pub confidence_floor: f64,
    pub mining_interval_ms: u64,
    pub prediction_threshold: f64,
    pub max_predictions: usize,
    pub reinforcement_step: f64,
    /// Weekly exponential decay applied to patterns a pass did not reinforce.
    pub decay_rate_per_week: f64,
    pub sequence_match: SequenceMatch,
    pub min_task_actions_for_suggestions: usize,
    pub max_suggestions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_stored_actions: 1000,
            max_persisted_actions: 500,
            min_actions_for_prediction: 10,
            confidence_floor: 0.3,
            mining_interval_ms: 300_000,
            prediction_threshold: 0.6,
            max_predictions: 10,
            reinforcement_step: 0.1,
            decay_rate_per_week: 0.05,
            sequence_match: SequenceMatch::Prefix,
            min_task_actions_for_suggestions: 5,
            max_suggestions: 5,
        }
    }
}

impl EngineConfig {
    pub fn mining_interval(&self) -> Duration {
        Duration::from_millis(self.mining_interval_ms)
    }

    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), ForesightError> {
        if self.max_stored_actions == 0 {
            return Err(ForesightError::Config(
                "max_stored_actions must be at least 1".into(),
            ));
        }
        if self.mining_interval_ms == 0 {
            return Err(ForesightError::Config(
                "mining_interval_ms must be positive".into(),
            ));
        }
        for (name, value) in [
            ("confidence_floor", self.confidence_floor),
            ("prediction_threshold", self.prediction_threshold),
            ("reinforcement_step", self.reinforcement_step),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ForesightError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.decay_rate_per_week < 0.0 || !self.decay_rate_per_week.is_finite() {
            return Err(ForesightError::Config(
                "decay_rate_per_week must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to the data directory.
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::db_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.engine.validate()?;
        Ok(config)
    }
}
