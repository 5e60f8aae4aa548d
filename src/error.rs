use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The table, its backing file, or a required column could not be read.
    #[error("Data access error: {0}")]
    DataAccess(String),
    /// The data or an input violates the fixed 9+1 binary schema.
    #[error("Validation error: {0}")]
    Validation(String),
    /// One candidate could not be tuned or fitted. Recovered by the pipeline.
    #[error("Fit failure for candidate {candidate}: {reason}")]
    FitFailure { candidate: String, reason: String },
    /// A model artifact could not be written, moved, removed or read.
    #[error("Artifact error at {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },
    #[error("No candidate model could be fitted")]
    NoCandidateSucceeded,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn fit_failure(candidate: impl Into<String>, reason: impl ToString) -> Self {
        Self::FitFailure {
            candidate: candidate.into(),
            reason: reason.to_string(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that abort a run as opposed to being logged and skipped.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FitFailure { .. } | Self::Artifact { .. })
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::DataAccess(err.to_string())
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataAccess(err.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_follows_taxonomy() {
        assert!(PipelineError::DataAccess("gone".into()).is_fatal());
        assert!(PipelineError::Validation("bad".into()).is_fatal());
        assert!(PipelineError::NoCandidateSucceeded.is_fatal());
        assert!(!PipelineError::fit_failure("knn", "k too large").is_fatal());
        assert!(!PipelineError::artifact("models/x.json", "missing").is_fatal());
    }

    #[test]
    fn test_fit_failure_message_names_candidate() {
        let err = PipelineError::fit_failure("random_forest", "empty hyperparameter grid");
        assert_eq!(
            err.to_string(),
            "Fit failure for candidate random_forest: empty hyperparameter grid"
        );
    }
}
