use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pipe]
name = "kitchen"
total_unit = "L"

[thermal]
k_warm = 4.0
k_cold = 8.0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_replay(dir: &tempfile::TempDir) -> PathBuf {
    let mut csv = String::from("timestamp,channel,value\n");
    csv.push_str("2024-03-01T08:00:00,totalizer,100\n");
    for m in 1..=30 {
        csv.push_str(&format!("2024-03-01T08:{m:02}:00,temperature,14.0\n"));
    }
    csv.push_str("2024-03-01T08:31:00,totalizer,110\n");
    let path = dir.path().join("readings.csv");
    fs::write(&path, csv).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check-config"], 0, "config OK", "stdout")]
#[case(&["replay"], 2, "required", "stderr")]
#[case(&["simulate", "--hours", "0"], 1, "--hours must be > 0", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("residuum").unwrap();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    if stream == "stdout" {
        assert.stdout(predicate::str::contains(needle));
    } else {
        assert.stderr(predicate::str::contains(needle));
    }
}

#[test]
fn replay_reports_tick_and_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let input = write_replay(&dir);

    Command::cargo_bin("residuum")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("tick at 110 L"))
        .stdout(predicate::str::contains("--- Residuum Summary ---"))
        .stdout(predicate::str::contains("Readings: 32"));
}

#[test]
fn replay_with_bad_header_exits_with_input_code() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let input = dir.path().join("bad.csv");
    fs::write(&input, "time,kind,reading\n2024-03-01T08:00:00,totalizer,100\n").unwrap();

    Command::cargo_bin("residuum")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg(&input)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Expected 'timestamp,channel,value'"));
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[thermal]\nclip = 50.0\n").unwrap();

    Command::cargo_bin("residuum")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("thermal.clip"));
}

#[test]
fn run_without_corrections_leaves_no_state_file() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let input = write_replay(&dir);
    let state = dir.path().join("state.toml");

    Command::cargo_bin("residuum")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--state")
        .arg(&state)
        .arg("replay")
        .arg(&input)
        .assert()
        .success();
    assert!(!state.exists());
}

#[test]
fn state_file_overrides_coefficients() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.toml");
    fs::write(&state, "k_warm = 5.5\n").unwrap();

    Command::cargo_bin("residuum")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--state")
        .arg(&state)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("k_warm=5.500"))
        .stdout(predicate::str::contains("[state file]"));
}

#[test]
fn vib_compare_prints_effect() {
    let dir = tempdir().unwrap();
    let off = dir.path().join("off.csv");
    let on = dir.path().join("on.csv");
    fs::write(
        &off,
        "x,y,z,mag\n0.0,0.0,1.00,1.00\n0.0,0.0,1.01,1.01\n0.0,0.0,0.99,0.99\n0.0,0.0,1.00,1.00\n",
    )
    .unwrap();
    fs::write(
        &on,
        "x,y,z,mag\n0.1,0.0,1.10,1.10\n0.1,0.0,1.30,1.30\n0.1,0.0,0.90,0.90\n0.1,0.0,1.20,1.20\n",
    )
    .unwrap();

    Command::cargo_bin("residuum")
        .unwrap()
        .arg("vib-compare")
        .arg(&off)
        .arg(&on)
        .assert()
        .success()
        .stdout(predicate::str::contains("cohen's d"))
        .stdout(predicate::str::contains("(large)"));
}
