use rusqlite::{params_from_iter, Connection};
use std::fs;
use std::path::Path;
use water_potability::artifacts::ModelArtifact;
use water_potability::data_loader::FEATURE_NAMES;
use water_potability::models::{EstimatorKind, ParamGrid};
use water_potability::registry::{registry_from, CandidateId, CandidateSpec};
use water_potability::{Config, PipelineError, Potability, Predictor, TrainingPipeline};

/// 100 rows, 80 labelled 0 and 20 labelled 1, classes well apart.
fn write_table(path: &Path) {
    let conn = Connection::open(path).unwrap();
    let columns: Vec<String> = FEATURE_NAMES.iter().map(|n| format!("\"{}\" REAL", n)).collect();
    conn.execute(
        &format!(
            "CREATE TABLE water_potability ({}, Potability INTEGER)",
            columns.join(", ")
        ),
        [],
    )
    .unwrap();

    let placeholders = vec!["?"; FEATURE_NAMES.len() + 1].join(", ");
    let insert = format!("INSERT INTO water_potability VALUES ({})", placeholders);
    let mut state: u64 = 12345;
    for row in 0..100 {
        let label = if row < 80 { 0i64 } else { 1 };
        let mut values: Vec<f64> = (0..FEATURE_NAMES.len())
            .map(|col| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let noise = (state >> 33) as f64 / (1u64 << 31) as f64;
                (col as f64 + 1.0) * 10.0 + label as f64 * 25.0 + noise * 5.0
            })
            .collect();
        values.push(label as f64);
        conn.execute(&insert, params_from_iter(values.iter())).unwrap();
    }
}

fn small_registry(seed: u64) -> Vec<CandidateSpec> {
    registry_from(vec![
        (
            "random_forest",
            EstimatorKind::RandomForest,
            ParamGrid::new()
                .with("min_samples_leaf", [2])
                .with("criterion", ["gini", "entropy"])
                .with("n_estimators", [10])
                .with("random_state", [seed]),
        ),
        (
            "gradient_boosting",
            EstimatorKind::GradientBoosting,
            ParamGrid::new().with("n_estimators", [20]).with("max_depth", [2]),
        ),
        (
            "knn",
            EstimatorKind::KNearestNeighbors,
            ParamGrid::new().with("n_neighbors", [4, 10]),
        ),
    ])
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

struct Workspace {
    _dir: tempfile::TempDir,
    source: std::path::PathBuf,
    models: std::path::PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("water_potability.db");
        write_table(&source);
        let models = dir.path().join("models");
        fs::create_dir_all(&models).unwrap();
        Self {
            _dir: dir,
            source,
            models,
        }
    }

    fn prefix(&self) -> std::path::PathBuf {
        self.models.join("water_potability")
    }
}

#[test]
fn test_run_leaves_only_canonical_artifact() {
    let ws = Workspace::new();
    let config = Config::default();
    let pipeline = TrainingPipeline::with_registry(config.clone(), small_registry(config.training.seed));

    let report = pipeline.run(&ws.source, &ws.prefix()).unwrap();

    assert_eq!(report.scores.len(), 3);
    assert!(report.failures.is_empty());
    let best = report.scores.values().cloned().fold(f64::MIN, f64::max);
    assert_eq!(report.accuracy, best);
    let first_best = report
        .scores
        .iter()
        .find(|(_, &score)| score == best)
        .map(|(&id, _)| id)
        .unwrap();
    assert_eq!(report.winner, first_best);

    assert_eq!(report.canonical_path, ws.models.join("water_potability.json"));
    assert_eq!(file_names(&ws.models), vec!["water_potability.json"]);

    let artifact = ModelArtifact::load(&report.canonical_path).unwrap();
    assert_eq!(artifact.candidate_id, report.winner);
    assert_eq!(artifact.search.folds, 5);
}

#[test]
fn test_invalid_candidates_are_excluded() {
    let ws = Workspace::new();
    let registry = registry_from(vec![
        ("empty", EstimatorKind::KNearestNeighbors, ParamGrid::new()),
        (
            "zero_neighbours",
            EstimatorKind::KNearestNeighbors,
            ParamGrid::new().with("n_neighbors", [0]),
        ),
        (
            "knn",
            EstimatorKind::KNearestNeighbors,
            ParamGrid::new().with("n_neighbors", [3]),
        ),
    ]);
    let pipeline = TrainingPipeline::with_registry(Config::default(), registry);

    let report = pipeline.run(&ws.source, &ws.prefix()).unwrap();

    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|e| matches!(e, PipelineError::FitFailure { .. })));
    assert_eq!(report.scores.keys().copied().collect::<Vec<_>>(), vec![CandidateId(2)]);
    assert_eq!(report.winner, CandidateId(2));
    assert_eq!(file_names(&ws.models), vec!["water_potability.json"]);
}

#[test]
fn test_all_candidates_failing_is_fatal() {
    let ws = Workspace::new();
    let registry = registry_from(vec![(
        "empty",
        EstimatorKind::RandomForest,
        ParamGrid::new(),
    )]);
    let pipeline = TrainingPipeline::with_registry(Config::default(), registry);

    let result = pipeline.run(&ws.source, &ws.prefix());
    assert!(matches!(result, Err(PipelineError::NoCandidateSucceeded)));
    assert!(file_names(&ws.models).is_empty());
}

#[test]
fn test_missing_source_aborts_without_touching_artifacts() {
    let ws = Workspace::new();
    fs::write(ws.models.join("water_potability.json"), "previous model").unwrap();
    let pipeline = TrainingPipeline::with_registry(Config::default(), small_registry(7));

    let result = pipeline.run(&ws.models.join("absent.db"), &ws.prefix());
    assert!(matches!(result, Err(PipelineError::DataAccess(_))));
    assert_eq!(
        fs::read_to_string(ws.models.join("water_potability.json")).unwrap(),
        "previous model"
    );
}

#[test]
fn test_rerun_replaces_canonical_artifact() {
    let ws = Workspace::new();
    let pipeline = TrainingPipeline::with_registry(Config::default(), small_registry(7));

    let first = pipeline.run(&ws.source, &ws.prefix()).unwrap();
    let after_first = file_names(&ws.models);
    let second = pipeline.run(&ws.source, &ws.prefix()).unwrap();

    assert_eq!(file_names(&ws.models), after_first);
    assert_eq!(first.winner, second.winner);
    assert_eq!(first.scores, second.scores);
}

#[test]
fn test_predictor_serves_canonical_artifact() {
    let ws = Workspace::new();
    let pipeline = TrainingPipeline::with_registry(Config::default(), small_registry(7));
    let report = pipeline.run(&ws.source, &ws.prefix()).unwrap();

    let predictor = Predictor::load(&report.canonical_path).unwrap();
    let clean: [f64; 9] = std::array::from_fn(|col| (col as f64 + 1.0) * 10.0 + 2.5);
    let dirty: [f64; 9] = std::array::from_fn(|col| (col as f64 + 1.0) * 10.0 + 27.5);
    assert_eq!(predictor.predict(&clean).unwrap(), Potability::NonPotable);
    assert_eq!(predictor.predict(&dirty).unwrap(), Potability::Potable);
}

#[test]
fn test_default_registry_end_to_end() {
    let ws = Workspace::new();
    let pipeline = TrainingPipeline::new(Config::default());

    let report = pipeline.run(&ws.source, &ws.prefix()).unwrap();

    assert_eq!(report.scores.len(), 3);
    assert_eq!(file_names(&ws.models), vec!["water_potability.json"]);
    let artifact = ModelArtifact::load(&report.canonical_path).unwrap();
    assert_eq!(artifact.candidate, report.winner_name);
}
