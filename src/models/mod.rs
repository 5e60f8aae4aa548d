pub mod forest;
pub mod gbdt;
pub mod knn;
pub mod params;
pub mod traits;

pub use self::forest::RandomForest;
pub use self::gbdt::GBDTModel;
pub use self::knn::KNearestNeighbors;
pub use params::{ParamGrid, ParamValue, Params};
pub use traits::{Model, ModelError, ModelFactory};

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model families a candidate can be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    RandomForest,
    GradientBoosting,
    KNearestNeighbors,
}

impl EstimatorKind {
    /// Untrained estimator for one grid point.
    pub fn build(self, params: &Params) -> Result<Estimator, ModelError> {
        Ok(match self {
            Self::RandomForest => Estimator::RandomForest(RandomForest::create(params)?),
            Self::GradientBoosting => Estimator::GradientBoosting(GBDTModel::create(params)?),
            Self::KNearestNeighbors => Estimator::KNearestNeighbors(KNearestNeighbors::create(params)?),
        })
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RandomForest => "random forest",
            Self::GradientBoosting => "gradient boosting",
            Self::KNearestNeighbors => "k-nearest neighbours",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    RandomForest(RandomForest),
    GradientBoosting(GBDTModel),
    KNearestNeighbors(KNearestNeighbors),
}

impl Estimator {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Self::RandomForest(_) => EstimatorKind::RandomForest,
            Self::GradientBoosting(_) => EstimatorKind::GradientBoosting,
            Self::KNearestNeighbors(_) => EstimatorKind::KNearestNeighbors,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            Self::RandomForest(m) => m,
            Self::GradientBoosting(m) => m,
            Self::KNearestNeighbors(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            Self::RandomForest(m) => m,
            Self::GradientBoosting(m) => m,
            Self::KNearestNeighbors(m) => m,
        }
    }
}

impl Model for Estimator {
    fn train(&mut self, features: ArrayView2<f64>, labels: ArrayView1<u8>) -> Result<(), ModelError> {
        self.as_model_mut().train(features, labels)
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<u8>, ModelError> {
        self.as_model().predict(features)
    }
}
