use ndarray::Array2;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::artifacts::ModelArtifact;
use crate::data_loader::FEATURE_COUNT;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Potability {
    NonPotable,
    Potable,
}

impl Potability {
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            Self::Potable
        } else {
            Self::NonPotable
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::NonPotable => "Non-Potable",
            Self::Potable => "Potable",
        }
    }
}

impl fmt::Display for Potability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Based on the input parameters the model predicts that the water would be {}",
            self.describe()
        )
    }
}

/// A loaded canonical artifact. Built once and handed to whatever serves
/// requests.
#[derive(Debug)]
pub struct Predictor {
    artifact: ModelArtifact,
}

impl Predictor {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let artifact = ModelArtifact::load(path.as_ref())?;
        info!(
            candidate = %artifact.candidate,
            kind = %artifact.kind,
            path = %path.as_ref().display(),
            "Model loaded"
        );
        Ok(Self { artifact })
    }

    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<Potability> {
        let row = Array2::from_shape_vec((1, FEATURE_COUNT), features.to_vec())
            .map_err(|e| PipelineError::Validation(e.to_string()))?;
        let predicted = self
            .artifact
            .pipeline
            .predict(row.view())
            .map_err(|e| PipelineError::Validation(format!("prediction failed: {}", e)))?;
        Ok(Potability::from_label(predicted[0]))
    }
}

/// Maps nine raw form values, in table order, to features. Anything that is
/// not a number reads as 0.0.
pub fn parse_features<I, S>(raw: I) -> Result<[f64; FEATURE_COUNT]>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let values: Vec<f64> = raw
        .into_iter()
        .map(|value| value.as_ref().trim().parse::<f64>().unwrap_or(0.0))
        .collect();
    let count = values.len();
    values.try_into().map_err(|_| {
        PipelineError::Validation(format!(
            "expected {} feature values, got {}",
            FEATURE_COUNT, count
        ))
    })
}
