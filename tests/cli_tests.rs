// End-to-end tests of the phasestats binary: import, aggregate, compare, stats

mod utils;

use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use utils::{dataset, RunSpec};

/// Temp dir with an imported two-commit dataset; returns (dir, db path)
fn imported_workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("phasestats.db");
    let data = dir.path().join("dataset.json");

    let specs = [
        RunSpec::new("r1").commit("aaa"),
        RunSpec::new("r2").commit("bbb").energy_offset(400.0),
    ];
    std::fs::write(&data, serde_json::to_string(&dataset(&specs)).unwrap()).unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db").arg(&db).arg("import").arg(&data);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 machines, 2 runs, 24 measurements"));

    (dir, db)
}

fn aggregate(db: &Path, run_id: &str) {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db").arg(db).arg("aggregate").arg(run_id);
    cmd.assert().success().stdout(predicate::str::contains(format!(
        "Stored 10 phase stats for run {}",
        run_id
    )));
}

#[test]
fn test_compare_json_output() {
    let (_dir, db) = imported_workspace();
    aggregate(&db, "r1");
    aggregate(&db, "r2");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db")
        .arg(&db)
        .arg("compare")
        .arg("r1")
        .arg("r2")
        .arg("--format")
        .arg("json");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["comparison_case"], "Commit");
    assert_eq!(json["comparison_details"], serde_json::json!(["aaa", "bbb"]));
    assert_eq!(json["common_info"]["Machine"], "Cluster node 1");
}

#[test]
fn test_compare_text_output() {
    let (_dir, db) = imported_workspace();
    aggregate(&db, "r1");
    aggregate(&db, "r2");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db").arg(&db).arg("compare").arg("r1").arg("r2");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Comparison: Commit (aaa vs bbb)"))
        .stdout(predicate::str::contains("[RUNTIME]"))
        .stdout(predicate::str::contains("Machine Energy [TOTAL]"));
}

#[test]
fn test_stats_single_run() {
    let (_dir, db) = imported_workspace();
    aggregate(&db, "r1");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("stats").arg("r1").arg("--db").arg(&db);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("Single run"))
        .stdout(predicate::str::contains("Commit: aaa"));
}

#[test]
fn test_aggregate_twice_fails() {
    let (_dir, db) = imported_workspace();
    aggregate(&db, "r1");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db").arg(&db).arg("aggregate").arg("r1");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to aggregate run r1"));
}

#[test]
fn test_unknown_force_mode_fails() {
    let (_dir, db) = imported_workspace();
    aggregate(&db, "r1");
    aggregate(&db, "r2");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db")
        .arg(&db)
        .arg("compare")
        .arg("r1")
        .arg("r2")
        .arg("--force")
        .arg("planets");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Forcing a comparison mode for unknown mode"));
}

#[test]
fn test_compare_without_stats_fails() {
    let (_dir, db) = imported_workspace();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db").arg(&db).arg("compare").arg("r1").arg("r2");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No phase stats found for runs: r1, r2"));
}

#[test]
fn test_invalid_config_rejected() {
    let (dir, db) = imported_workspace();
    let config = dir.path().join("phasestats.toml");
    std::fs::write(&config, "[statistics]\nsignificance_level = 2.0\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db")
        .arg(&db)
        .arg("--config")
        .arg(&config)
        .arg("stats")
        .arg("r1");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("significance_level"));
}

#[test]
fn test_missing_dataset_file() {
    let dir = TempDir::new().unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("phasestats");
    cmd.arg("--db")
        .arg(dir.path().join("phasestats.db"))
        .arg("import")
        .arg(dir.path().join("nope.json"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read dataset"));
}
