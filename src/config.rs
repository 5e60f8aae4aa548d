use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "WATER_POTABILITY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Table read from SQLite sources.
    pub table: String,
    pub label_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            table: "water_potability".to_string(),
            label_column: "Potability".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed shared by the split, the balancer and every stochastic estimator.
    pub seed: u64,
    pub test_fraction: f64,
    pub cv_folds: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            test_fraction: 0.2,
            cv_folds: 5,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if training.cv_folds < 2 {
            return Err(PipelineError::Config(format!(
                "cv_folds must be at least 2, got {}",
                training.cv_folds
            )));
        }
        if !(training.test_fraction > 0.0 && training.test_fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "test_fraction must lie in (0, 1), got {}",
                training.test_fraction
            )));
        }
        if self.data.label_column.is_empty() {
            return Err(PipelineError::Config("label_column is empty".to_string()));
        }
        Ok(())
    }
}
