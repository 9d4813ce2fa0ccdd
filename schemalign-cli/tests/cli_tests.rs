//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Build command for the schemalign-cli binary (finds it in target/debug when run via cargo test).
fn schemalign_cli() -> Command {
    cargo_bin_cmd!("schemalign-cli")
}

/// Path to schemalign library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("schemalign")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = schemalign_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("layout"))
        .stdout(predicate::str::contains("template"));
}

#[test]
fn test_cli_version() {
    let mut cmd = schemalign_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_layout_divider() {
    let mut cmd = schemalign_cli();

    cmd.arg("layout")
        .arg(fixtures_dir().join("divider_floating.json"))
        .arg("--corpus")
        .arg(fixtures_dir().join("corpus"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("divider"))
        .stdout(predicate::str::contains("Pieces matched: 1/1"));
}

#[test]
fn test_cli_layout_partitions() {
    let mut cmd = schemalign_cli();

    cmd.arg("layout")
        .arg(fixtures_dir().join("ldo_floating.json"))
        .arg("--corpus")
        .arg(fixtures_dir().join("corpus"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("U1#left"))
        .stdout(predicate::str::contains("U1#bottom"))
        .stdout(predicate::str::contains("no template"))
        .stdout(predicate::str::contains("Pieces matched: 2/3"))
        .stdout(predicate::str::contains("Floating:       0"));
}

#[test]
fn test_cli_layout_strict_rejects_unmatched_piece() {
    let mut cmd = schemalign_cli();

    cmd.arg("layout")
        .arg(fixtures_dir().join("ldo_floating.json"))
        .arg("--corpus")
        .arg(fixtures_dir().join("corpus"))
        .arg("--strict");

    cmd.assert().code(1).stdout(predicate::str::contains("U1#right"));
}

#[test]
fn test_cli_layout_json_output() {
    let mut cmd = schemalign_cli();

    cmd.arg("layout")
        .arg(fixtures_dir().join("ldo_floating.json"))
        .arg("--corpus")
        .arg(fixtures_dir().join("corpus"))
        .arg("--no-partition")
        .arg("--format")
        .arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"reports\""))
        .stdout(predicate::str::contains("\"power/ldo\""))
        .stdout(predicate::str::contains("\"graph\""));
}

#[test]
fn test_cli_layout_writes_output() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("laid_out.json");

    let mut cmd = schemalign_cli();
    cmd.arg("layout")
        .arg(fixtures_dir().join("divider_floating.json"))
        .arg("--corpus")
        .arg(fixtures_dir().join("corpus"))
        .arg("--mode")
        .arg("inherit")
        .arg("-o")
        .arg(&out);
    cmd.assert().success().stdout(predicate::str::contains("Written to"));

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("\"kind\": \"fixed\""));
    assert!(written.contains("VCC_IN"));
}

#[test]
fn test_cli_layout_nonexistent_file() {
    let mut cmd = schemalign_cli();

    cmd.arg("layout")
        .arg("does_not_exist.json")
        .arg("--corpus")
        .arg(fixtures_dir().join("corpus"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_layout_invalid_graph() {
    let mut cmd = schemalign_cli();

    cmd.arg("layout")
        .arg(fixtures_dir().join("invalid_missing_box.json"))
        .arg("--corpus")
        .arg(fixtures_dir().join("corpus"));

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("missing box"));
}

#[test]
fn test_cli_partition_command() {
    let mut cmd = schemalign_cli();

    cmd.arg("partition")
        .arg(fixtures_dir().join("ldo_floating.json"))
        .arg("--steps");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("U1#right"))
        .stdout(predicate::str::contains("accept"));
}

#[test]
fn test_cli_partition_without_seeds() {
    let mut cmd = schemalign_cli();

    cmd.arg("partition").arg(fixtures_dir().join("divider_floating.json"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No box has enough pins"));
}

#[test]
fn test_cli_assign_command() {
    let mut cmd = schemalign_cli();

    cmd.arg("assign")
        .arg(fixtures_dir().join("divider_floating.json"))
        .arg(fixtures_dir().join("corpus").join("divider.json"))
        .arg("--strategy")
        .arg("wl-bucket");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("R1 -> RA"))
        .stdout(predicate::str::contains("R2 -> RB"));
}

#[test]
fn test_cli_assign_json_with_edits() {
    let mut cmd = schemalign_cli();

    cmd.arg("assign")
        .arg(fixtures_dir().join("ldo_floating.json"))
        .arg(fixtures_dir().join("corpus").join("divider.json"))
        .arg("--edits")
        .arg("--format")
        .arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"assignment\""))
        .stdout(predicate::str::contains("delete_node"));
}

#[test]
fn test_cli_distance_to_self_is_zero() {
    let path = fixtures_dir().join("ldo_floating.json");
    let mut cmd = schemalign_cli();

    cmd.arg("distance").arg(&path).arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0.000000"));
}

#[test]
fn test_cli_templates_command() {
    let mut cmd = schemalign_cli();

    cmd.arg("templates").arg(fixtures_dir().join("corpus")).arg("--long");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("power/ldo"))
        .stdout(predicate::str::contains("3 boxes, 9 pins, 4 networks"));
}

#[test]
fn test_cli_exit_codes() {
    let mut cmd = schemalign_cli();
    cmd.arg("templates").arg(fixtures_dir().join("corpus"));
    cmd.assert().code(0);

    let mut cmd = schemalign_cli();
    cmd.arg("templates").arg(fixtures_dir().join("nonexistent"));
    cmd.assert().code(1);
}

#[test]
fn test_cli_output_formats_are_different() {
    let path = fixtures_dir().join("ldo_floating.json");

    let mut cmd_human = schemalign_cli();
    cmd_human.arg("partition").arg(&path).arg("--format").arg("human");
    let human_output = cmd_human.output().unwrap();

    let mut cmd_json = schemalign_cli();
    cmd_json.arg("partition").arg(&path).arg("--format").arg("json");
    let json_output = cmd_json.output().unwrap();

    assert_ne!(
        human_output.stdout,
        json_output.stdout,
        "Different formats should produce different output"
    );
}
