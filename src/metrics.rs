use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Fraction of positions where `predicted` equals `truth`.
pub fn accuracy(truth: ArrayView1<u8>, predicted: ArrayView1<u8>) -> Result<f64> {
    check_lengths(truth, predicted)?;
    let correct = truth
        .iter()
        .zip(predicted.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f64 / truth.len() as f64)
}

fn check_lengths(truth: ArrayView1<u8>, predicted: ArrayView1<u8>) -> Result<()> {
    if truth.len() != predicted.len() {
        return Err(PipelineError::Validation(format!(
            "{} labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Err(PipelineError::Validation(
            "cannot score an empty prediction set".to_string(),
        ));
    }
    Ok(())
}

/// Binary confusion counts with label 1 as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(truth: ArrayView1<u8>, predicted: ArrayView1<u8>) -> Result<Self> {
        check_lengths(truth, predicted)?;
        let mut counts = Self::default();
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            match (t, p) {
                (1, 1) => counts.true_positive += 1,
                (0, 1) => counts.false_positive += 1,
                (1, _) => counts.false_negative += 1,
                _ => counts.true_negative += 1,
            }
        }
        Ok(counts)
    }

    /// `TP / (TP + FP)`, zero when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// `TP / (TP + FN)`.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let truth = array![0u8, 1, 1, 0];
        let predicted = array![0u8, 1, 0, 0];
        assert_eq!(accuracy(truth.view(), predicted.view()).unwrap(), 0.75);
    }

    #[test]
    fn test_accuracy_rejects_mismatch() {
        let truth = array![0u8, 1];
        let predicted = array![0u8];
        assert!(accuracy(truth.view(), predicted.view()).is_err());
    }

    #[test]
    fn test_confusion_counts() {
        let truth = array![1u8, 1, 0, 0, 1];
        let predicted = array![1u8, 0, 1, 0, 1];
        let counts = ConfusionCounts::from_predictions(truth.view(), predicted.view()).unwrap();
        assert_eq!(counts.true_positive, 2);
        assert_eq!(counts.false_negative, 1);
        assert_eq!(counts.false_positive, 1);
        assert_eq!(counts.true_negative, 1);
        assert!((counts.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((counts.recall() - 2.0 / 3.0).abs() < 1e-12);
    }
}
