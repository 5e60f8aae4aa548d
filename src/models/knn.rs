use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::params::Params;
use super::traits::{check_training_input, Model, ModelError, ModelFactory};

/// Majority vote among the `n_neighbors` closest training rows (Euclidean).
/// Split votes go to label 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    n_neighbors: usize,
    points: Option<Array2<f64>>,
    labels: Option<Array1<u8>>,
}

impl KNearestNeighbors {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            points: None,
            labels: None,
        }
    }

    fn vote(&self, points: &Array2<f64>, labels: &Array1<u8>, query: ArrayView1<f64>) -> u8 {
        let mut distances: Vec<(f64, u8)> = points
            .rows()
            .into_iter()
            .zip(labels.iter())
            .map(|(row, &label)| {
                let d: f64 = row.iter().zip(query.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                (d, label)
            })
            .collect();

        let k = self.n_neighbors;
        if k < distances.len() {
            distances.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
        }
        let positive = distances[..k].iter().filter(|(_, label)| *label == 1).count();
        u8::from(2 * positive > k)
    }
}

impl Model for KNearestNeighbors {
    fn train(&mut self, features: ArrayView2<f64>, labels: ArrayView1<u8>) -> Result<(), ModelError> {
        check_training_input(features, labels)?;
        if self.n_neighbors > features.nrows() {
            return Err(ModelError::Training(format!(
                "n_neighbors {} exceeds {} training rows",
                self.n_neighbors,
                features.nrows()
            )));
        }
        self.points = Some(features.to_owned());
        self.labels = Some(labels.to_owned());
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<u8>, ModelError> {
        let (points, labels) = match (&self.points, &self.labels) {
            (Some(points), Some(labels)) => (points, labels),
            _ => return Err(ModelError::NotFitted),
        };
        Ok(features
            .rows()
            .into_iter()
            .map(|query| self.vote(points, labels, query))
            .collect())
    }
}

impl ModelFactory for KNearestNeighbors {
    fn create(params: &Params) -> Result<Self, ModelError> {
        params.reject_unknown(&["n_neighbors"])?;
        Ok(Self::new(params.count("n_neighbors", 5)?))
    }
}
