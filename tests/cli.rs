use std::fs;
use std::process::{Command, Output};

fn run_in_empty_dir(bin: &str, args: &[&str]) -> (Output, usize) {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(bin)
        .args(args)
        .current_dir(dir.path())
        .env_remove("WATER_POTABILITY_CONFIG")
        .output()
        .unwrap();
    let created = fs::read_dir(dir.path()).unwrap().count();
    (output, created)
}

fn assert_usage_exit(output: &Output, created: usize) {
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage:"));
    assert!(output.stdout.is_empty());
    assert_eq!(created, 0);
}

#[test]
fn test_training_rejects_wrong_argument_count() {
    let bin = env!("CARGO_BIN_EXE_water_potability");
    for args in [
        &[][..],
        &["water_potability.db"][..],
        &["water_potability.db", "models/water_potability", "extra"][..],
    ] {
        let (output, created) = run_in_empty_dir(bin, args);
        assert_usage_exit(&output, created);
    }
}

#[test]
fn test_training_with_missing_source_fails_without_usage() {
    let bin = env!("CARGO_BIN_EXE_water_potability");
    let (output, created) = run_in_empty_dir(bin, &["absent.db", "models/water_potability"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("usage:"));
    assert_eq!(created, 0);
}

#[test]
fn test_predict_rejects_wrong_argument_count() {
    let bin = env!("CARGO_BIN_EXE_predict");
    let nine = ["1"; 9];
    let mut eleven = vec!["model.json"];
    eleven.extend_from_slice(&["1"; 10]);

    for args in [&[][..], &["model.json"][..], &nine[..], &eleven[..]] {
        let (output, created) = run_in_empty_dir(bin, args);
        assert_usage_exit(&output, created);
    }
}
