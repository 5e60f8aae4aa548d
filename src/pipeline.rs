use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::artifacts::{ArtifactStore, CleanupReport};
use crate::balancer::upsample_minority;
use crate::config::Config;
use crate::data_loader::{train_test_split, DataLoader};
use crate::error::{PipelineError, Result};
use crate::registry::{default_registry, CandidateId, CandidateSpec};
use crate::search::{evaluate_candidate, CandidateOutcome};
use crate::selector::{finalize, EvaluationResult};

/// What a completed training run produced.
#[derive(Debug)]
pub struct RunReport {
    pub scores: EvaluationResult,
    pub failures: Vec<PipelineError>,
    pub winner: CandidateId,
    pub winner_name: String,
    pub accuracy: f64,
    pub canonical_path: PathBuf,
    pub cleanup: CleanupReport,
}

pub struct TrainingPipeline {
    config: Config,
    registry: Vec<CandidateSpec>,
}

impl TrainingPipeline {
    /// Pipeline over the default candidates, seeded from `config`.
    pub fn new(config: Config) -> Self {
        let registry = default_registry(config.training.seed);
        Self { config, registry }
    }

    pub fn with_registry(config: Config, registry: Vec<CandidateSpec>) -> Self {
        Self { config, registry }
    }

    pub fn registry(&self) -> &[CandidateSpec] {
        &self.registry
    }

    /// Load, split, balance, tune every candidate, keep the best.
    ///
    /// Loading, validation and splitting finish before any artifact is
    /// touched. Candidate failures are logged and leave the candidate out of
    /// the comparison.
    #[instrument(skip(self), fields(source = %source.display(), prefix = %prefix.display()))]
    pub fn run(&self, source: &Path, prefix: &Path) -> Result<RunReport> {
        let training = &self.config.training;

        let dataset = DataLoader::new(source, &self.config.data).load()?;
        let split = train_test_split(&dataset, training.test_fraction, training.seed)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            "Stratified split done"
        );

        let train = upsample_minority(&split.train, training.seed)?;
        info!(
            rows = train.len(),
            label_0 = train.count_of(0),
            label_1 = train.count_of(1),
            "Training split balanced"
        );

        let store = ArtifactStore::new(prefix);
        let known: Vec<CandidateId> = self.registry.iter().map(|c| c.id).collect();
        let (outcomes, failures) = evaluate_all(&self.registry, &store, &known, |candidate| {
            evaluate_candidate(candidate, &train, &split.test, training.cv_folds, &store)
        })?;

        let scores: EvaluationResult = outcomes
            .iter()
            .map(|(&id, outcome)| (id, outcome.test_accuracy))
            .collect();
        info!(?scores, "Held-out accuracy per candidate");

        let promotion = finalize(&store, outcomes, &known)?;
        info!(
            winner = %promotion.candidate,
            accuracy = promotion.accuracy,
            path = %promotion.canonical_path.display(),
            "Canonical model written"
        );

        Ok(RunReport {
            scores,
            failures,
            winner: promotion.winner,
            winner_name: promotion.candidate,
            accuracy: promotion.accuracy,
            canonical_path: promotion.canonical_path,
            cleanup: promotion.cleanup,
        })
    }
}

/// Runs `evaluate` over every candidate, collecting outcomes and non-fatal
/// failures. A fatal error removes the transient artifacts written so far.
fn evaluate_all<F>(
    registry: &[CandidateSpec],
    store: &ArtifactStore,
    known: &[CandidateId],
    mut evaluate: F,
) -> Result<(BTreeMap<CandidateId, CandidateOutcome>, Vec<PipelineError>)>
where
    F: FnMut(&CandidateSpec) -> Result<CandidateOutcome>,
{
    let mut outcomes = BTreeMap::new();
    let mut failures = Vec::new();

    for candidate in registry {
        info!(candidate = %candidate.name, kind = %candidate.kind, "Evaluating candidate");
        match evaluate(candidate) {
            Ok(outcome) => {
                outcomes.insert(candidate.id, outcome);
            }
            Err(err) if !err.is_fatal() => {
                warn!(candidate = %candidate.name, error = %err, "Candidate excluded");
                failures.push(err);
            }
            Err(err) => {
                error!(candidate = %candidate.name, error = %err, "Run aborted");
                store.cleanup(known);
                return Err(err);
            }
        }
    }

    Ok((outcomes, failures))
}
