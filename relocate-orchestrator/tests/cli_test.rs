//! End-to-end tests of the `relocate` binary against the mock provider.
//!
//! Every test runs inside its own temp directory (so no stray `.env` is
//! picked up) with a fixture passed through `MOCK_FIXTURE`.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const FIXTURE: &str = r#"{
    "settle_polls": 1,
    "instances": [
        {"region": "us-east-1", "instance_id": "i-001", "instance_type": "t3.micro"},
        {"region": "us-east-1", "instance_id": "i-002", "instance_type": "m5.large", "state": "stopped"}
    ],
    "faults": [
        {"operation": "create_image", "instance_id": "i-002", "fault": {"reject": "InvalidParameterValue: boom"}}
    ]
}"#;

fn workdir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fixture.json"), FIXTURE).unwrap();
    dir
}

fn relocate(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("relocate");
    cmd.current_dir(dir.path())
        .env("MOCK_FIXTURE", dir.path().join("fixture.json"))
        .env("RUST_LOG", "warn");
    for var in [
        "SOURCE_REGION",
        "DESTINATION_REGION",
        "PROVIDER",
        "MIGRATION_JOURNAL",
        "WAIT_POLL_INTERVAL_SECS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn migrate(dir: &TempDir) -> Command {
    let mut cmd = relocate(dir);
    cmd.args([
        "migrate",
        "--provider",
        "mock",
        "--source-region",
        "us-east-1",
        "--destination-region",
        "eu-west-1",
        "--poll-interval-secs",
        "0",
    ]);
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = workdir();
    relocate(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("describe"));
}

#[test]
fn migrate_prints_progress_and_summary() {
    let dir = workdir();
    migrate(&dir)
        .arg("i-001")
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1: i-001"))
        .stdout(predicate::str::contains("i-001: migrated -> i-mock"))
        .stdout(predicate::str::contains("1 succeeded, 0 failed (us-east-1 -> eu-west-1)"));
}

#[test]
fn one_failed_instance_exits_1_after_the_whole_batch() {
    let dir = workdir();
    migrate(&dir)
        .args(["i-002", "i-001"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1/2: i-002"))
        .stdout(predicate::str::contains("2/2: i-001"))
        .stdout(predicate::str::contains(
            "i-002: FAILED at image: InvalidParameterValue: boom",
        ))
        .stdout(predicate::str::contains("i-001: migrated -> "))
        .stdout(predicate::str::contains("1 succeeded, 1 failed"));
}

#[test]
fn ids_can_come_from_a_file() {
    let dir = workdir();
    fs::write(
        dir.path().join("ids.txt"),
        "# instances to move\ni-001\n\n  i-001  \n",
    )
    .unwrap();
    migrate(&dir)
        .args(["--file", "ids.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2/2: i-001"))
        .stdout(predicate::str::contains("2 succeeded, 0 failed"));
}

#[test]
fn json_output_is_the_full_report() {
    let dir = workdir();
    let output = migrate(&dir)
        .args(["--output", "json", "i-001", "i-002"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["source_region"], "us-east-1");
    assert_eq!(report["destination_region"], "eu-west-1");
    let outcomes = report["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["success"], true);
    assert_eq!(outcomes[0]["instance_type"], "t3.micro");
    assert_eq!(outcomes[0]["final_state"], "launched");
    assert_eq!(outcomes[1]["success"], false);
    assert_eq!(outcomes[1]["failed_step"], "image");
    assert_eq!(outcomes[1]["error_message"], "InvalidParameterValue: boom");

    // Progress goes to stderr so stdout stays parseable.
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1/2: i-001"));
}

#[test]
fn journal_is_written_when_requested() {
    let dir = workdir();
    migrate(&dir)
        .args(["--journal", "actions.jsonl", "i-001"])
        .assert()
        .success();
    let journal = fs::read_to_string(dir.path().join("actions.jsonl")).unwrap();
    assert_eq!(journal.lines().count(), 8);
    assert!(journal.contains("\"action_type\":\"LAUNCH_INSTANCE\""));
}

#[test]
fn same_region_is_a_setup_error() {
    let dir = workdir();
    relocate(&dir)
        .args([
            "migrate",
            "--provider",
            "mock",
            "--source-region",
            "us-east-1",
            "--destination-region",
            "us-east-1",
            "i-001",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "source and destination region are both 'us-east-1'",
        ));
}

#[test]
fn empty_batch_is_a_setup_error() {
    let dir = workdir();
    migrate(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no instance ids given"));
}

#[test]
fn unknown_provider_is_a_setup_error() {
    let dir = workdir();
    relocate(&dir)
        .args([
            "migrate",
            "--provider",
            "gcp",
            "--source-region",
            "us-east-1",
            "--destination-region",
            "eu-west-1",
            "i-001",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown provider 'gcp'"));
}

#[test]
fn regions_can_come_from_the_environment() {
    let dir = workdir();
    relocate(&dir)
        .env("SOURCE_REGION", "us-east-1")
        .env("DESTINATION_REGION", "eu-west-1")
        .env("PROVIDER", "mock")
        .env("WAIT_POLL_INTERVAL_SECS", "0")
        .args(["migrate", "i-001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(us-east-1 -> eu-west-1)"));
}

#[test]
fn describe_shows_type_and_state() {
    let dir = workdir();
    relocate(&dir)
        .args(["describe", "--provider", "mock", "--region", "us-east-1", "i-002"])
        .assert()
        .success()
        .stdout(predicate::str::diff("i-002: type=m5.large state=stopped\n"));
}

#[test]
fn describe_unknown_instance_fails() {
    let dir = workdir();
    relocate(&dir)
        .args(["describe", "--provider", "mock", "--region", "eu-west-1", "i-001"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "instance i-001 not found in eu-west-1 (0 matches)",
        ));
}
