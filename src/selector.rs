use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

use crate::artifacts::{ArtifactStore, CleanupReport};
use crate::error::{PipelineError, Result};
use crate::registry::CandidateId;
use crate::search::CandidateOutcome;

/// Held-out accuracy per successfully evaluated candidate. Iterates in
/// registry order.
pub type EvaluationResult = BTreeMap<CandidateId, f64>;

/// Candidate with the highest accuracy; the earliest registered wins a tie.
pub fn select_best(results: &EvaluationResult) -> Option<(CandidateId, f64)> {
    results
        .iter()
        .fold(None, |best: Option<(CandidateId, f64)>, (&id, &score)| match best {
            Some((_, top)) if score <= top => best,
            _ => Some((id, score)),
        })
}

/// Result of promoting the winner and clearing transient artifacts.
#[derive(Debug)]
pub struct Promotion {
    pub winner: CandidateId,
    pub candidate: String,
    pub accuracy: f64,
    pub canonical_path: PathBuf,
    pub cleanup: CleanupReport,
}

/// Picks the best outcome, promotes its artifact to the canonical path and
/// deletes every transient artifact of `known` candidates.
///
/// With no outcome at all the transient files are still cleared and
/// [`PipelineError::NoCandidateSucceeded`] is returned.
#[instrument(skip_all, fields(candidates = outcomes.len()))]
pub fn finalize(
    store: &ArtifactStore,
    mut outcomes: BTreeMap<CandidateId, CandidateOutcome>,
    known: &[CandidateId],
) -> Result<Promotion> {
    let scores: EvaluationResult = outcomes
        .iter()
        .map(|(&id, outcome)| (id, outcome.test_accuracy))
        .collect();

    let Some((winner, accuracy)) = select_best(&scores) else {
        store.cleanup(known);
        return Err(PipelineError::NoCandidateSucceeded);
    };
    let outcome = outcomes
        .remove(&winner)
        .ok_or(PipelineError::NoCandidateSucceeded)?;
    info!(winner = %outcome.artifact.candidate, accuracy, "Best candidate selected");

    let canonical_path = store.promote(&outcome.artifact)?;
    let cleanup = store.cleanup(known);
    if !cleanup.missing.is_empty() {
        warn!(
            missing = cleanup.missing.len(),
            removed = cleanup.removed.len(),
            "Some cleanup targets were already absent"
        );
    }

    Ok(Promotion {
        winner,
        candidate: outcome.artifact.candidate,
        accuracy,
        canonical_path,
        cleanup,
    })
}
