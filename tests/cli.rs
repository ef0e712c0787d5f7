use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

mod common;
use common::TestEnv;

fn run_help(dir: &TempDir, args: &[&str]) {
    let mut cmd = cargo_bin_cmd!("tracestudy");
    cmd.current_dir(dir.path())
        .args(args)
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn every_cli_command_has_help_path() {
    let dir = TempDir::new().expect("temp dir");

    run_help(&dir, &[]);

    // analysis commands
    run_help(&dir, &["flatten"]);
    run_help(&dir, &["study"]);
    run_help(&dir, &["importance"]);
    run_help(&dir, &["labels"]);
    run_help(&dir, &["intervals"]);

    // model commands
    run_help(&dir, &["estimate"]);
    run_help(&dir, &["fit"]);
    run_help(&dir, &["predict"]);
    run_help(&dir, &["threshold"]);
}

#[test]
fn labels_text_output() {
    let env = TestEnv::new();
    env.cmd()
        .args(["labels", "request_trace.jsonl"])
        .assert()
        .success()
        .stdout(contains("records\t6"))
        .stdout(contains("budget_breach\t1"))
        .stdout(contains("dropped\t1"));
}

#[test]
fn missing_input_exits_with_code_two() {
    let env = TestEnv::new();
    env.cmd()
        .args(["labels", "nope.jsonl"])
        .assert()
        .code(2)
        .stderr(contains("input file not found"));
}

#[test]
fn missing_input_json_error_envelope() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "study", "nope.jsonl"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).expect("valid json error");
    assert_eq!(v["ok"], false);
    assert_eq!(v["error"]["code"], "INPUT_NOT_FOUND");
    assert!(v["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("nope.jsonl"));
}

#[test]
fn no_files_and_no_defaults_is_no_input() {
    let dir = TempDir::new().expect("temp dir");
    let mut cmd = cargo_bin_cmd!("tracestudy");
    let out = cmd
        .current_dir(dir.path())
        .args(["--json", "labels"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).expect("valid json error");
    assert_eq!(v["error"]["code"], "NO_INPUT");
}

#[test]
fn missing_explicit_config_fails() {
    let env = TestEnv::new();
    env.cmd()
        .args(["--config", "absent.toml", "labels", "request_trace.jsonl"])
        .assert()
        .failure()
        .stderr(contains("config file not found"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let mut cmd = cargo_bin_cmd!("tracestudy");
    cmd.current_dir(dir.path())
        .arg("bogus")
        .assert()
        .failure()
        .stderr(contains("unrecognized subcommand").or(contains("error")));
}
