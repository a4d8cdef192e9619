// tests/golden_cli_tests.rs
// Golden tests for the nlshell binary using insta for canonical JSON output

use assert_cmd::Command;
use insta::assert_json_snapshot;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// nlshell with an empty config so the host's configuration never leaks in
fn nlshell(dir: &TempDir) -> Command {
    let config = dir.path().join("config.yaml");
    if !config.exists() {
        fs::write(&config, "{}").unwrap();
    }
    let mut cmd = Command::cargo_bin("nlshell").expect("nlshell binary must be built");
    cmd.env_remove("NLSHELL_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

#[test]
fn golden_interpret_multi_step() {
    let dir = tempdir().unwrap();
    let output = nlshell(&dir)
        .args(["interpret", "--json"])
        .arg("create a new folder called test and move file.txt into it")
        .assert()
        .success()
        .get_output()
        .clone();

    assert_json_snapshot!(stdout_json(&output), @r###"
    {
      "commands": [
        "mkdir test",
        "mv file.txt test/"
      ],
      "input": "create a new folder called test and move file.txt into it",
      "matched": true,
      "suggestions": []
    }
    "###);
}

#[test]
fn golden_interpret_no_match_suggests() {
    let dir = tempdir().unwrap();
    let output = nlshell(&dir)
        .args(["interpret", "--json", "all", "files", "please"])
        .assert()
        .success()
        .get_output()
        .clone();

    assert_json_snapshot!(stdout_json(&output), @r###"
    {
      "commands": [
        "all files please"
      ],
      "input": "all files please",
      "matched": false,
      "suggestions": [
        "cat",
        "ls",
        "ls -la"
      ]
    }
    "###);
}

#[test]
fn test_interpret_plain_output() {
    let dir = tempdir().unwrap();
    nlshell(&dir)
        .args(["interpret", "CREATE A FILE CALLED Test.TXT"])
        .assert()
        .success()
        .stdout("touch test.txt\n");
}

#[test]
fn test_run_multi_step_in_directory() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    fs::create_dir(&work).unwrap();
    fs::write(work.join("file.txt"), "payload").unwrap();

    let output = nlshell(&dir)
        .arg("run")
        .arg("--cwd")
        .arg(&work)
        .arg("create a new folder called test and move file.txt into it")
        .assert()
        .success()
        .get_output()
        .clone();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Executing: mkdir test"));
    assert!(stdout.contains("Executing: mv file.txt test/"));
    assert_eq!(
        fs::read_to_string(work.join("test").join("file.txt")).unwrap(),
        "payload"
    );
}

#[test]
fn test_run_stops_on_first_failure() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    fs::create_dir_all(work.join("test")).unwrap();
    fs::write(work.join("file.txt"), "payload").unwrap();

    let output = nlshell(&dir)
        .arg("run")
        .arg("--cwd")
        .arg(&work)
        .arg("create a new folder called test and move file.txt into it")
        .assert()
        .failure()
        .get_output()
        .clone();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("Stopping execution due to error"));
    assert!(stderr.contains("mkdir: cannot create directory 'test': File exists"));
    assert!(work.join("file.txt").exists());
}

#[test]
fn test_run_literal_json_turn() {
    let dir = tempdir().unwrap();
    let output = nlshell(&dir)
        .args(["run", "--literal", "--json", "--cwd"])
        .arg(dir.path())
        .arg("pwd")
        .assert()
        .success()
        .get_output()
        .clone();

    let turn = stdout_json(&output);
    assert_eq!(turn["mode"], "literal");
    assert_eq!(turn["exit_requested"], false);
    assert_eq!(turn["steps"][0]["command"], "pwd");
    assert_eq!(turn["steps"][0]["outcome"]["status"], 0);

    let printed = turn["steps"][0]["outcome"]["output"].as_str().unwrap();
    assert_eq!(
        Path::new(printed),
        dir.path().canonicalize().unwrap().as_path()
    );
}

#[test]
fn test_user_rules_take_precedence() {
    let dir = tempdir().unwrap();
    let rules = dir.path().join("rules.yaml");
    fs::write(
        &rules,
        "rules:\n  - pattern: \"where am i\"\n    template: \"echo lost\"\n",
    )
    .unwrap();

    nlshell(&dir)
        .arg("--rules")
        .arg(&rules)
        .args(["interpret", "where am i"])
        .assert()
        .success()
        .stdout("echo lost\n");

    let output = nlshell(&dir)
        .arg("--rules")
        .arg(&rules)
        .arg("rules")
        .assert()
        .success()
        .get_output()
        .clone();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_single = stdout.lines().find(|l| l.starts_with("[rule]")).unwrap();
    assert_eq!(first_single, "[rule]  where am i => echo lost");
}

#[test]
fn test_invalid_rule_file_fails() {
    let dir = tempdir().unwrap();
    let rules = dir.path().join("rules.yaml");
    fs::write(&rules, "rules:\n  - pattern: \"(unclosed\"\n    template: \"x\"\n").unwrap();

    nlshell(&dir)
        .arg("--rules")
        .arg(&rules)
        .args(["interpret", "anything"])
        .assert()
        .failure();
}

#[test]
fn test_phrases_and_version() {
    let dir = tempdir().unwrap();
    let output = nlshell(&dir).arg("phrases").assert().success().get_output().clone();
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Natural Language Command Help:"));

    let output = nlshell(&dir).arg("version").assert().success().get_output().clone();
    assert!(String::from_utf8_lossy(&output.stdout)
        .starts_with(&format!("nlshell v{}", env!("CARGO_PKG_VERSION"))));
}
