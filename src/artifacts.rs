use glob::{glob, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::models::EstimatorKind;
use crate::registry::{CandidateId, CandidateSpec};
use crate::search::{FittedPipeline, SearchSummary};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
const ARTIFACT_EXTENSION: &str = "json";

/// Serialized fitted pipeline plus the search that produced it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub candidate_id: CandidateId,
    pub candidate: String,
    pub kind: EstimatorKind,
    pub pipeline: FittedPipeline,
    pub search: SearchSummary,
}

impl ModelArtifact {
    pub fn new(spec: &CandidateSpec, pipeline: FittedPipeline, search: SearchSummary) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            candidate_id: spec.id,
            candidate: spec.name.clone(),
            kind: spec.kind,
            pipeline,
            search,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::artifact(path, e))?;
        let artifact: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::artifact(path, e))?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PipelineError::artifact(
                path,
                format!("unsupported format version {}", artifact.format_version),
            ));
        }
        if artifact.pipeline.estimator.kind() != artifact.kind {
            return Err(PipelineError::artifact(path, "estimator does not match recorded kind"));
        }
        Ok(artifact)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::artifact(parent, e))?;
        }
        let file = File::create(path).map_err(|e| PipelineError::artifact(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| PipelineError::artifact(path, e))?;
        writer.flush().map_err(|e| PipelineError::artifact(path, e))?;
        Ok(())
    }
}

/// Files removed and targets found missing during a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub missing: Vec<PipelineError>,
}

/// Artifact naming under one output prefix `P`: candidates write
/// `P_model_<id>.json`, the promoted winner lives at `P.json`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    prefix: String,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(prefix: P) -> Self {
        Self {
            prefix: prefix.as_ref().to_string_lossy().into_owned(),
        }
    }

    pub fn transient_path(&self, id: CandidateId) -> PathBuf {
        PathBuf::from(format!("{}_model_{}.{}", self.prefix, id, ARTIFACT_EXTENSION))
    }

    pub fn canonical_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.prefix, ARTIFACT_EXTENSION))
    }

    fn transient_pattern(&self) -> String {
        format!("{}_model_*.{}", Pattern::escape(&self.prefix), ARTIFACT_EXTENSION)
    }

    pub fn save(&self, id: CandidateId, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.transient_path(id);
        artifact.write(&path)?;
        Ok(path)
    }

    /// Transient artifacts currently on disk.
    pub fn transient_artifacts(&self) -> Vec<PathBuf> {
        let pattern = self.transient_pattern();
        match glob(&pattern) {
            Ok(paths) => paths
                .filter_map(|entry| match entry {
                    Ok(path) => Some(path),
                    Err(err) => {
                        warn!(error = %err, "Unreadable artifact path skipped");
                        None
                    }
                })
                .collect(),
            Err(err) => {
                warn!(%pattern, error = %err, "Invalid artifact pattern");
                Vec::new()
            }
        }
    }

    /// Moves the winner's transient file onto the canonical path, replacing
    /// any earlier canonical artifact.
    ///
    /// A missing transient file is logged and the canonical artifact is
    /// written from `artifact` instead.
    pub fn promote(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let transient = self.transient_path(artifact.candidate_id);
        let canonical = self.canonical_path();

        match fs::rename(&transient, &canonical) {
            Ok(()) => {
                info!(from = %transient.display(), to = %canonical.display(), "Best model promoted");
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let missing = PipelineError::artifact(&transient, err);
                warn!(error = %missing, "Transient artifact missing, writing canonical artifact from memory");
                artifact.write(&canonical)?;
            }
            Err(err) => return Err(PipelineError::artifact(&canonical, err)),
        }
        Ok(canonical)
    }

    /// Deletes every transient artifact: whatever matches the naming pattern
    /// plus the paths of `known` candidates. Missing targets are logged and
    /// reported, never fatal.
    pub fn cleanup(&self, known: &[CandidateId]) -> CleanupReport {
        let mut targets: BTreeSet<PathBuf> = self.transient_artifacts().into_iter().collect();
        targets.extend(known.iter().map(|&id| self.transient_path(id)));

        let mut report = CleanupReport::default();
        for path in targets {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Transient artifact removed");
                    report.removed.push(path);
                }
                Err(err) => {
                    let err = PipelineError::artifact(&path, err);
                    debug!(error = %err, "Cleanup target already absent");
                    report.missing.push(err);
                }
            }
        }
        report
    }
}
