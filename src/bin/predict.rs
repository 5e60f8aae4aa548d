use anyhow::Context;
use std::process::ExitCode;
use water_potability::data_loader::{FEATURE_COUNT, FEATURE_NAMES};
use water_potability::serving::{parse_features, Predictor};

fn usage() -> String {
    format!("usage: predict <artifact path> {}", FEATURE_NAMES.join(" "))
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != FEATURE_COUNT + 1 {
        eprintln!("{}", usage());
        return ExitCode::from(2);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run(&args[0], &args[1..]) {
        Ok(sentence) => {
            println!("{}", sentence);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(artifact: &str, raw: &[String]) -> anyhow::Result<String> {
    let predictor = Predictor::load(artifact).with_context(|| format!("loading {}", artifact))?;
    let features = parse_features(raw)?;
    let outcome = predictor.predict(&features)?;
    Ok(outcome.to_string())
}
