use super::params::Params;
use super::traits::{check_training_input, Model, ModelError, ModelFactory};
use gbdt::config::Config as GBDTConfig;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f32,
    pub max_depth: u32,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
        }
    }
}

/// Gradient-boosted trees with log-likelihood loss.
#[derive(Serialize, Deserialize)]
pub struct GBDTModel {
    config: BoostingConfig,
    model: Option<GBDT>,
}

impl fmt::Debug for GBDTModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GBDTModel")
            .field("config", &self.config)
            .field("trained", &self.model.is_some())
            .finish()
    }
}

impl GBDTModel {
    pub fn new(config: BoostingConfig) -> Self {
        Self { config, model: None }
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    fn gbdt_config(&self, feature_size: usize) -> GBDTConfig {
        let mut config = GBDTConfig::new();
        config.set_feature_size(feature_size);
        config.set_max_depth(self.config.max_depth);
        config.set_iterations(self.config.n_estimators);
        config.set_shrinkage(self.config.learning_rate);
        config.set_loss("LogLikelyhood");
        config.set_debug(false);
        // Full sampling keeps training deterministic.
        config.set_data_sample_ratio(1.0);
        config.set_feature_sample_ratio(1.0);
        config.set_training_optimization_level(2);
        config
    }
}

impl Model for GBDTModel {
    fn train(&mut self, features: ArrayView2<f64>, labels: ArrayView1<u8>) -> Result<(), ModelError> {
        check_training_input(features, labels)?;

        // LogLikelyhood expects labels in {-1, 1}.
        let mut train_data: DataVec = features
            .rows()
            .into_iter()
            .zip(labels.iter())
            .map(|(row, &label)| {
                let target = if label == 1 { 1.0 } else { -1.0 };
                Data::new_training_data(row_to_f32(row), 1.0, target, None)
            })
            .collect();

        let mut gbdt = GBDT::new(&self.gbdt_config(features.ncols()));
        gbdt.fit(&mut train_data);

        self.model = Some(gbdt);
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<u8>, ModelError> {
        let model = self.model.as_ref().ok_or(ModelError::NotFitted)?;

        let test_data: DataVec = features
            .rows()
            .into_iter()
            .map(|row| Data::new_test_data(row_to_f32(row), None))
            .collect();
        let probabilities = model.predict(&test_data);

        Ok(probabilities.into_iter().map(|p| u8::from(p > 0.5)).collect())
    }
}

impl ModelFactory for GBDTModel {
    fn create(params: &Params) -> Result<Self, ModelError> {
        params.reject_unknown(&["n_estimators", "learning_rate", "max_depth"])?;
        let defaults = BoostingConfig::default();
        let max_depth = params.count("max_depth", defaults.max_depth as usize)?;

        Ok(Self::new(BoostingConfig {
            n_estimators: params.count("n_estimators", defaults.n_estimators)?,
            learning_rate: params.positive("learning_rate", defaults.learning_rate as f64)? as f32,
            max_depth: u32::try_from(max_depth)
                .map_err(|_| ModelError::invalid("max_depth", "out of range"))?,
        }))
    }
}

fn row_to_f32(row: ArrayView1<f64>) -> Vec<f32> {
    row.iter().map(|&v| v as f32).collect()
}
