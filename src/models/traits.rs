use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

use super::params::Params;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown hyperparameter {0}")]
    UnknownParam(String),
    #[error("invalid hyperparameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },
    #[error("model not trained")]
    NotFitted,
    #[error("training failed: {0}")]
    Training(String),
}

impl ModelError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A binary classifier over scaled feature rows.
pub trait Model {
    fn train(&mut self, features: ArrayView2<f64>, labels: ArrayView1<u8>) -> Result<(), ModelError>;
    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<u8>, ModelError>;
}

/// Builds an untrained model from one point of a hyperparameter grid.
pub trait ModelFactory: Sized {
    fn create(params: &Params) -> Result<Self, ModelError>;
}

/// Rejects empty or ragged training input before any model sees it.
pub(crate) fn check_training_input(
    features: ArrayView2<f64>,
    labels: ArrayView1<u8>,
) -> Result<(), ModelError> {
    if features.nrows() == 0 {
        return Err(ModelError::Training("no training rows".to_string()));
    }
    if features.nrows() != labels.len() {
        return Err(ModelError::Training(format!(
            "{} rows but {} labels",
            features.nrows(),
            labels.len()
        )));
    }
    Ok(())
}
