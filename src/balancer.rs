use ndarray::{concatenate, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use crate::data_loader::Dataset;
use crate::error::{PipelineError, Result};

/// Upsamples the minority label with replacement until both labels have the
/// majority's row count.
///
/// The result holds the majority rows in their original order followed by the
/// resampled minority rows. An already balanced input is returned unchanged.
/// Only binary labels are supported.
#[instrument(skip(train), fields(rows = train.len()))]
pub fn upsample_minority(train: &Dataset, seed: u64) -> Result<Dataset> {
    let counts = train.class_counts();
    if counts.len() != 2 {
        return Err(PipelineError::Validation(format!(
            "balancing needs exactly two label values, found {}",
            counts.len()
        )));
    }

    let (low, high) = (counts[0], counts[1]);
    if low.1 == high.1 {
        debug!(per_class = low.1, "Training split already balanced");
        return Ok(train.clone());
    }

    let (majority, minority) = if low.1 > high.1 { (low, high) } else { (high, low) };
    let rows_of = |label: u8| -> Vec<usize> {
        train
            .labels
            .iter()
            .enumerate()
            .filter(|(_, &value)| value == label)
            .map(|(idx, _)| idx)
            .collect()
    };
    let majority_rows = rows_of(majority.0);
    let minority_rows = rows_of(minority.0);

    let mut rng = StdRng::seed_from_u64(seed);
    let resampled: Vec<usize> = (0..majority.1)
        .map(|_| minority_rows[rng.random_range(0..minority_rows.len())])
        .collect();

    let kept = train.select(&majority_rows);
    let drawn = train.select(&resampled);
    let features = concatenate(Axis(0), &[kept.features.view(), drawn.features.view()])
        .map_err(|e| PipelineError::Validation(e.to_string()))?;
    let labels = concatenate(Axis(0), &[kept.labels.view(), drawn.labels.view()])
        .map_err(|e| PipelineError::Validation(e.to_string()))?;

    debug!(
        majority = majority.0,
        minority = minority.0,
        per_class = majority.1,
        "Minority label upsampled"
    );
    Dataset::new(features, labels)
}
