//! CLI integration tests. Each run clears TANDEM_CONFIG so the user's
//! environment never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tandem() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("tandem").unwrap();
    cmd.env_remove("TANDEM_CONFIG");
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("tandem.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn respond_prints_fused_json() {
    let output = tandem()
        .args(["respond", "where does the river go"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(
        json["fusion"]["unifiedText"]
            .as_str()
            .unwrap()
            .contains("where does the river go")
    );
    assert_eq!(json["deep"]["recursionDepth"], 7);
    let score = json["fusion"]["combinedScore"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
}

#[test]
fn respond_honours_depth_and_context() {
    let output = tandem()
        .args(["respond", "a quiet morning", "--depth", "2", "--context", "urgent"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["deep"]["recursionDepth"], 2);
    assert_eq!(json["fusion"]["weights"]["fast"], 0.7);
}

#[test]
fn respond_rejects_blank_input() {
    tandem()
        .args(["respond", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid input"));
}

#[test]
fn config_prints_defaults() {
    tandem()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("tick_period_ms = 10"))
        .stdout(predicate::str::contains("recursion_depth = 7"))
        .stdout(predicate::str::contains("[noise]"));
}

#[test]
fn config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "recursion_depth = 3\nmemory_capacity = 50\n");
    tandem()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("recursion_depth = 3"))
        .stdout(predicate::str::contains("memory_capacity = 50"));
}

#[test]
fn config_env_var_is_used() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "tick_memory_stride = 9\n");
    tandem()
        .arg("config")
        .env("TANDEM_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("tick_memory_stride = 9"));
}

#[test]
fn invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "consolidation_threshold = 4.0\n");
    tandem()
        .args(["respond", "hello"])
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn serve_answers_inputs_and_commands() {
    let output = tandem()
        .arg("serve")
        .write_stdin("hello there friend\n:stats\n:dance\n:quit\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert!(lines.iter().any(|l| l["command"] == "stats"));
    assert!(lines.iter().any(|l| l["event"] == "error"));
    let unified = lines.iter().find(|l| l["event"] == "unified").unwrap();
    assert!(
        unified["result"]["unifiedText"]
            .as_str()
            .unwrap()
            .contains("hello there friend")
    );
    assert!(lines.iter().any(|l| l["event"] == "fastPartial"));
    assert!(lines.iter().any(|l| l["event"] == "deepPartial"));
    assert!(!lines.iter().any(|l| l["event"] == "tick"));
}

#[test]
fn serve_exits_on_eof() {
    tandem()
        .arg("serve")
        .write_stdin(":recall 1.0 0.5\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"command\":\"recall\""));
}

#[test]
fn serve_caps_huge_spiral_request() {
    tandem()
        .arg("serve")
        .write_stdin("remember the tide\n:spiral 0 18446744073709551615\n:quit\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"command\":\"spiral\""));
}
