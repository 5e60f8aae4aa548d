use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{EstimatorKind, ParamGrid};

/// Position of a candidate in its registry; lower ids win ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub usize);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named model family with its search space.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSpec {
    pub id: CandidateId,
    pub name: String,
    pub kind: EstimatorKind,
    pub grid: ParamGrid,
}

/// Assigns ids in declaration order.
pub fn registry_from(entries: Vec<(&str, EstimatorKind, ParamGrid)>) -> Vec<CandidateSpec> {
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, (name, kind, grid))| CandidateSpec {
            id: CandidateId(idx),
            name: name.to_string(),
            kind,
            grid,
        })
        .collect()
}

/// The tree-ensemble, boosting and distance-based candidates, in that order.
/// `seed` is pinned into every stochastic family's grid.
pub fn default_registry(seed: u64) -> Vec<CandidateSpec> {
    registry_from(vec![
        (
            "random_forest",
            EstimatorKind::RandomForest,
            ParamGrid::new()
                .with("min_samples_leaf", [2, 4, 6])
                .with("criterion", ["gini", "entropy"])
                .with("n_estimators", [100, 200])
                .with("random_state", [seed]),
        ),
        (
            "gradient_boosting",
            EstimatorKind::GradientBoosting,
            ParamGrid::new()
                .with("n_estimators", [100, 200])
                .with("learning_rate", [0.1])
                .with("max_depth", [3]),
        ),
        (
            "knn",
            EstimatorKind::KNearestNeighbors,
            ParamGrid::new().with("n_neighbors", [4, 10, 20]),
        ),
    ])
}
