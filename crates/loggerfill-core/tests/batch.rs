use std::fs;
use std::path::Path;

use loggerfill_core::batch::{run, FileStatus, RunError};
use loggerfill_core::config::Config;
use loggerfill_core::output::prepare_directory;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../loggerfill-parser/tests/data")
        .join(name);
    fs::read_to_string(path).expect("read fixture")
}

fn config_for(root: &Path) -> Config {
    let toml = r#"
start = "12/14/2017 17:00:00"
end = "12/14/2017 21:00:00"
frequency = "H"
input_directory = "raw-sensor-data"
output_directory = "gap-filled-sensor-data"
intermediate_directory = "intermediate-data"
"#;
    let mut config = Config::from_toml_str(toml).expect("config");
    config.resolve_relative_to(root);
    config
}

fn seed_inputs(root: &Path, files: &[(&str, &str)]) {
    let input = root.join("raw-sensor-data");
    fs::create_dir_all(&input).expect("create input dir");
    for (name, fixture_name) in files {
        fs::write(input.join(name), fixture(fixture_name)).expect("write input");
    }
}

fn output_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read output dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn malformed_file_does_not_stop_the_batch() {
    let root = tempfile::tempdir().expect("tempdir");
    seed_inputs(
        root.path(),
        &[
            ("ABC-1.csv", "ABC-1.csv"),
            ("D3Y-12Feb2018-0914.csv", "D3Y-12Feb2018-0914.csv"),
            ("broken.csv", "malformed-label.csv"),
        ],
    );
    let config = config_for(root.path());

    let summary = run(&config).expect("run");

    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.written(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_success());

    let failure = summary.failures().next().expect("one failure");
    assert!(failure.path.ends_with("broken.csv"));
    assert!(failure.error.as_deref().unwrap_or("").contains("header row 1"));

    assert_eq!(
        output_files(&config.output_directory),
        vec![
            "ABC_gap-filled-sensor-data.csv",
            "D3Y_gap-filled-sensor-data.csv",
        ]
    );
    assert!(output_files(&config.intermediate_directory).is_empty());

    let written = fs::read_to_string(
        config
            .output_directory
            .join("D3Y_gap-filled-sensor-data.csv"),
    )
    .expect("read output");
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3 + 5);
    assert!(lines[0].starts_with("D3Y,Port 1"));
    assert!(lines[1].starts_with("5 records,"));
    assert_eq!(lines[5], "2017-12-14 19:00:00,,,,,");
}

#[test]
fn rerun_replaces_previous_output() {
    let root = tempfile::tempdir().expect("tempdir");
    seed_inputs(root.path(), &[("ABC-1.csv", "ABC-1.csv")]);
    let config = config_for(root.path());

    fs::create_dir_all(&config.output_directory).expect("output dir");
    fs::write(config.output_directory.join("stale.csv"), "old").expect("stale file");

    let summary = run(&config).expect("run");
    assert!(summary.is_success());
    assert_eq!(
        output_files(&config.output_directory),
        vec!["ABC_gap-filled-sensor-data.csv"]
    );
}

#[test]
fn identical_inputs_are_reported_as_duplicates() {
    let root = tempfile::tempdir().expect("tempdir");
    seed_inputs(
        root.path(),
        &[("ABC-1.csv", "ABC-1.csv"), ("ABC-1 copy.csv", "ABC-1.csv")],
    );
    let config = config_for(root.path());

    let summary = run(&config).expect("run");

    assert_eq!(summary.written(), 1);
    assert_eq!(summary.duplicates(), 1);
    assert!(summary.is_success());
    let first = &summary.reports[0];
    let second = &summary.reports[1];
    assert_eq!(first.hash, second.hash);
    assert_eq!(second.status, FileStatus::Duplicate);
}

#[test]
fn undecodable_file_is_recorded_and_skipped() {
    let root = tempfile::tempdir().expect("tempdir");
    seed_inputs(root.path(), &[("ABC-1.csv", "ABC-1.csv")]);
    fs::write(
        root.path().join("raw-sensor-data").join("latin1.csv"),
        b"\xff\xfeXYZ.xls\n2 records\nMeasurement Time,Port 1\n",
    )
    .expect("write input");
    let config = config_for(root.path());

    let summary = run(&config).expect("run");

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.written(), 1);
    assert_eq!(summary.failed(), 1);
    let failure = summary.failures().next().expect("one failure");
    assert!(failure.path.ends_with("latin1.csv"));
    assert!(failure.hash.is_some());
    let message = failure.error.as_deref().expect("error message");
    assert!(message.contains("not valid UTF-8"), "unexpected error: {message}");
    assert_eq!(
        output_files(&config.output_directory),
        vec!["ABC_gap-filled-sensor-data.csv"]
    );
}

#[test]
fn second_file_for_same_device_fails() {
    let root = tempfile::tempdir().expect("tempdir");
    seed_inputs(root.path(), &[("a.csv", "ABC-1.csv")]);
    let other = fixture("ABC-1.csv").replace("0.310,12.0", "0.311,12.1");
    fs::write(root.path().join("raw-sensor-data/b.csv"), other).expect("write input");
    let config = config_for(root.path());

    let summary = run(&config).expect("run");

    assert_eq!(summary.written(), 1);
    assert_eq!(summary.failed(), 1);
    let failure = summary.failures().next().expect("failure");
    assert!(failure.path.ends_with("b.csv"));
    assert!(failure
        .error
        .as_deref()
        .unwrap_or("")
        .contains("already written"));
}

#[test]
fn refuses_to_reset_the_input_directory() {
    let root = tempfile::tempdir().expect("tempdir");
    seed_inputs(root.path(), &[("ABC-1.csv", "ABC-1.csv")]);
    let mut config = config_for(root.path());
    config.output_directory = root.path().to_path_buf();

    let err = run(&config).expect_err("must refuse");
    assert!(matches!(err, RunError::UnsafeDirectory { .. }));
    assert!(root.path().join("raw-sensor-data/ABC-1.csv").exists());
}

#[test]
fn invalid_window_is_fatal() {
    let root = tempfile::tempdir().expect("tempdir");
    seed_inputs(root.path(), &[("ABC-1.csv", "ABC-1.csv")]);
    let mut config = config_for(root.path());
    config.end = "12/13/2017 17:00:00".to_string();

    let err = run(&config).expect_err("must fail");
    assert!(matches!(err, RunError::Axis(_)));
    assert!(!config.output_directory.exists());
}

#[test]
fn prepare_directory_is_idempotent() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = root.path().join("scratch");

    prepare_directory(&dir).expect("first prepare");
    fs::write(dir.join("leftover.csv"), "x").expect("write");
    prepare_directory(&dir).expect("second prepare");
    prepare_directory(&dir).expect("third prepare");

    assert!(dir.is_dir());
    assert!(output_files(&dir).is_empty());
}
