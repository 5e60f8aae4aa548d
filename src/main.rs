use anyhow::Context;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use water_potability::config::{Config, CONFIG_ENV, DEFAULT_CONFIG_PATH};
use water_potability::TrainingPipeline;

const USAGE: &str = "usage: water_potability <source table path> <artifact prefix>\n\
                     e.g. water_potability data/water_potability.db models/water_potability";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [source, prefix] = args.as_slice() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(PathBuf::from(source), PathBuf::from(prefix)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(source: PathBuf, prefix: PathBuf) -> anyhow::Result<()> {
    info!("Starting water potability training");

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    debug!("Loading config from path: {}", config_path);
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading config {}", config_path))?;
    debug!(?config, "Config loaded successfully");

    let pipeline = TrainingPipeline::new(config);
    let report = pipeline
        .run(&source, &prefix)
        .with_context(|| format!("training on {}", source.display()))?;

    for (id, accuracy) in &report.scores {
        let name = &pipeline.registry()[id.0].name;
        info!(candidate = %name, accuracy, "Held-out accuracy");
    }
    for failure in &report.failures {
        info!(%failure, "Candidate skipped");
    }
    info!(
        winner = %report.winner_name,
        accuracy = report.accuracy,
        "Training complete! Model saved as {}",
        report.canonical_path.display()
    );
    Ok(())
}
