use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

use crate::artifacts::{ArtifactStore, ModelArtifact};
use crate::data_loader::Dataset;
use crate::error::{PipelineError, Result};
use crate::metrics::{accuracy, ConfusionCounts};
use crate::models::{Estimator, EstimatorKind, Model, ModelError, Params};
use crate::preprocessing::StandardScaler;
use crate::registry::CandidateSpec;

/// Feature scaling followed by a trained estimator.
#[derive(Debug, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub scaler: StandardScaler,
    pub estimator: Estimator,
}

impl FittedPipeline {
    /// Fits the scaler on `features`, then the estimator on the scaled rows.
    pub fn fit(
        kind: EstimatorKind,
        params: &Params,
        features: ArrayView2<f64>,
        labels: ArrayView1<u8>,
    ) -> Result<Self, ModelError> {
        let mut estimator = kind.build(params)?;
        let scaler =
            StandardScaler::fit(features).map_err(|e| ModelError::Training(e.to_string()))?;
        let scaled = scaler
            .transform(features)
            .map_err(|e| ModelError::Training(e.to_string()))?;
        estimator.train(scaled.view(), labels)?;
        Ok(Self { scaler, estimator })
    }

    pub fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<u8>, ModelError> {
        let scaled = self
            .scaler
            .transform(features)
            .map_err(|e| ModelError::Training(e.to_string()))?;
        self.estimator.predict(scaled.view())
    }
}

/// Cross-validation outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub params: Params,
    pub fold_scores: Vec<f64>,
    /// `None` when the grid point failed to build or fit.
    pub mean_score: Option<f64>,
    pub error: Option<String>,
}

/// Cross-validation state kept alongside the refitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub folds: usize,
    pub results: Vec<CvResult>,
    pub best_index: usize,
}

impl SearchSummary {
    pub fn best(&self) -> &CvResult {
        &self.results[self.best_index]
    }

    pub fn best_score(&self) -> f64 {
        self.best().mean_score.unwrap_or(0.0)
    }
}

/// A tuned, persisted and scored candidate, ready for selection.
#[derive(Debug)]
pub struct CandidateOutcome {
    pub artifact: ModelArtifact,
    pub artifact_path: PathBuf,
    pub test_accuracy: f64,
}

/// Test-row indices of each fold for stratified k-fold without shuffling.
///
/// Per label, rows in their original order are cut into `k` contiguous runs;
/// the first `n % k` runs get one extra row.
pub fn stratified_folds(labels: ArrayView1<u8>, k: usize) -> Vec<Vec<usize>> {
    let mut folds = vec![Vec::new(); k];
    let mut values: Vec<u8> = labels.iter().copied().collect();
    values.sort_unstable();
    values.dedup();

    for value in values {
        let rows: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == value)
            .map(|(idx, _)| idx)
            .collect();
        let (size, extra) = (rows.len() / k, rows.len() % k);
        let mut start = 0;
        for (fold_idx, fold) in folds.iter_mut().enumerate() {
            let len = size + usize::from(fold_idx < extra);
            fold.extend_from_slice(&rows[start..start + len]);
            start += len;
        }
    }

    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

fn cross_validate(
    kind: EstimatorKind,
    params: &Params,
    train: &Dataset,
    folds: &[Vec<usize>],
) -> Result<Vec<f64>, ModelError> {
    let n_rows = train.len();
    folds
        .iter()
        .map(|test_rows| {
            let mut held_out = vec![false; n_rows];
            for &row in test_rows {
                held_out[row] = true;
            }
            let fit_rows: Vec<usize> = (0..n_rows).filter(|&row| !held_out[row]).collect();

            let fit_set = train.select(&fit_rows);
            let score_set = train.select(test_rows);
            let pipeline =
                FittedPipeline::fit(kind, params, fit_set.features.view(), fit_set.labels.view())?;
            let predicted = pipeline.predict(score_set.features.view())?;
            accuracy(score_set.labels.view(), predicted.view())
                .map_err(|e| ModelError::Training(e.to_string()))
        })
        .collect()
}

/// Exhaustive grid search scored by mean cross-validated accuracy.
///
/// Grid points that fail are recorded and skipped; the first of equally
/// scoring points wins.
pub fn grid_search(candidate: &CandidateSpec, train: &Dataset, k: usize) -> Result<SearchSummary> {
    let fail = |reason: String| PipelineError::fit_failure(candidate.name.clone(), reason);

    if candidate.grid.is_empty() {
        return Err(fail("empty hyperparameter grid".to_string()));
    }
    if k < 2 || train.len() < k {
        return Err(fail(format!(
            "cannot run {}-fold cross-validation on {} rows",
            k,
            train.len()
        )));
    }

    let folds = stratified_folds(train.labels.view(), k);
    let mut results = Vec::new();
    let mut best: Option<(usize, f64)> = None;

    for params in candidate.grid.combinations() {
        let result = match cross_validate(candidate.kind, &params, train, &folds) {
            Ok(fold_scores) => {
                let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                debug!(candidate = %candidate.name, %params, mean, "Grid point scored");
                if best.map_or(true, |(_, score)| mean > score) {
                    best = Some((results.len(), mean));
                }
                CvResult {
                    params,
                    fold_scores,
                    mean_score: Some(mean),
                    error: None,
                }
            }
            Err(err) => {
                warn!(candidate = %candidate.name, %params, error = %err, "Grid point failed");
                CvResult {
                    params,
                    fold_scores: Vec::new(),
                    mean_score: None,
                    error: Some(err.to_string()),
                }
            }
        };
        results.push(result);
    }

    let (best_index, _) = best.ok_or_else(|| {
        let first = results
            .iter()
            .find_map(|r| r.error.clone())
            .unwrap_or_default();
        fail(format!("every grid point failed; first error: {}", first))
    })?;

    Ok(SearchSummary {
        folds: k,
        results,
        best_index,
    })
}

/// Tunes `candidate` on the balanced training set, persists the refitted
/// pipeline to its transient artifact path, then scores it once on `test`.
#[instrument(skip_all, fields(candidate = %candidate.name))]
pub fn evaluate_candidate(
    candidate: &CandidateSpec,
    train: &Dataset,
    test: &Dataset,
    k: usize,
    store: &ArtifactStore,
) -> Result<CandidateOutcome> {
    let search = grid_search(candidate, train, k)?;
    let best = search.best();
    info!(params = %best.params, cv_accuracy = search.best_score(), "Best grid point");

    let pipeline = FittedPipeline::fit(
        candidate.kind,
        &best.params,
        train.features.view(),
        train.labels.view(),
    )
    .map_err(|e| PipelineError::fit_failure(candidate.name.clone(), e))?;

    let artifact = ModelArtifact::new(candidate, pipeline, search);
    let artifact_path = store.save(candidate.id, &artifact)?;
    debug!(path = %artifact_path.display(), "Candidate artifact written");

    let predicted = artifact
        .pipeline
        .predict(test.features.view())
        .map_err(|e| PipelineError::fit_failure(candidate.name.clone(), e))?;
    let test_accuracy = accuracy(test.labels.view(), predicted.view())?;
    let counts = ConfusionCounts::from_predictions(test.labels.view(), predicted.view())?;
    info!(
        test_accuracy,
        precision = counts.precision(),
        recall = counts.recall(),
        "Candidate scored on held-out split"
    );

    Ok(CandidateOutcome {
        artifact,
        artifact_path,
        test_accuracy,
    })
}
