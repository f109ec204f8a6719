//! Integration tests for the `meshctl` CLI binary.
//!
//! Every command runs against the simulated lab network configured by the
//! `[simulation]` defaults: controller 1, a multisensor at 2, a dimmer at 3,
//! and a second multisensor (4) waiting to be included.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `meshctl` binary with env isolation.
///
/// Points config and data directories into `home` and shortens every
/// simulated delay so commands finish quickly.
fn meshctl_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("MESHCTL_CONFIG")
        .env_remove("MESHCTL_OUTPUT")
        .env_remove("RUST_LOG")
        .env("MESHCTL_SIMULATION__READY_AFTER_MS", "0")
        .env("MESHCTL_SIMULATION__INCLUSION_DELAY_MS", "50")
        .env("MESHCTL_SIMULATION__EXCLUSION_DELAY_MS", "50")
        .env("MESHCTL_TIMEOUTS__POLL_INTERVAL_MS", "20");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    meshctl_cmd(&home).arg("--help").assert().success().stdout(
        predicate::str::contains("network")
            .and(predicate::str::contains("nodes"))
            .and(predicate::str::contains("sensors"))
            .and(predicate::str::contains("dimmers")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    meshctl_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("meshctl"));
}

#[test]
fn test_completions_zsh() {
    let home = TempDir::new().unwrap();
    meshctl_cmd(&home)
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Network ─────────────────────────────────────────────────────────

#[test]
fn test_network_start_reports_ready() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["network", "start", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let report = json(&output);
    assert_eq!(report["outcome"], "ready");
    assert_eq!(report["status"], "ready");
}

#[test]
fn test_network_info_lists_home_id_and_nodes() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["network", "info", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let info = json(&output);
    assert_eq!(info["home_id"], 0xc0ff_ee01_u32);
    let ids: Vec<u64> = info["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, [1, 2, 3]);
}

#[test]
fn test_hard_reset_without_yes_is_refused() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["network", "hard-reset"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

#[test]
fn test_hard_reset_with_nodes_needs_force() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["--yes", "network", "hard-reset"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("--force"));
}

// ── Nodes ───────────────────────────────────────────────────────────

#[test]
fn test_nodes_list_plain_is_ordered() {
    let home = TempDir::new().unwrap();
    meshctl_cmd(&home)
        .args(["nodes", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout("1\n2\n3\n");
}

#[test]
fn test_nodes_list_filters_sensors() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["nodes", "list", "--filter", "sensors", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let rows = json(&output);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["id"], 2);
    assert_eq!(rows[0]["label"], "Routing Multilevel Sensor");
}

#[test]
fn test_unknown_node_exits_not_found() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["nodes", "get", "42"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("nodes list"));
}

#[test]
fn test_nodes_add_reports_joined_node() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["nodes", "add", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(json(&output)["id"], 4);
}

#[test]
fn test_nodes_add_times_out() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .env("MESHCTL_SIMULATION__INCLUSION_DELAY_MS", "5000")
        .args(["nodes", "add", "--timeout", "1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(8));
    assert!(combined_output(&output).contains("node inclusion"));
}

#[test]
fn test_set_location_prints_previous() {
    let home = TempDir::new().unwrap();
    meshctl_cmd(&home)
        .args(["nodes", "location", "2", "Kitchen", "-o", "plain"])
        .assert()
        .success()
        .stdout("Lab\n");
}

// ── Sensors & dimmers ───────────────────────────────────────────────

#[test]
fn test_sensor_temperature_is_celsius() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["--name", "Pi lab1", "sensors", "read", "2", "temperature", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let readings = json(&output);
    assert_eq!(readings[0]["controller"], "Pi lab1");
    assert_eq!(readings[0]["location"], "Lab");
    assert_eq!(readings[0]["type"], "temperature");
    assert_eq!(readings[0]["value"], 22.0);
}

#[test]
fn test_dimmer_is_not_a_sensor() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["sensors", "read", "3"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_dimmer_level_out_of_range() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["dimmers", "set", "3", "150"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("level"));
}

#[test]
fn test_dimmer_set_returns_previous_level() {
    let home = TempDir::new().unwrap();
    meshctl_cmd(&home)
        .args(["dimmers", "set", "3", "40", "-o", "plain"])
        .assert()
        .success()
        .stdout("0\n");
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.toml");
    meshctl_cmd(&home)
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_set_then_show() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("meshctl.toml");

    meshctl_cmd(&home)
        .env("MESHCTL_CONFIG", &path)
        .args(["config", "set", "controller.name", "Pi lab1"])
        .assert()
        .success();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("Pi lab1"));
    assert!(
        !written.contains("ready_after_ms = 0"),
        "environment overrides must not be persisted:\n{written}"
    );

    meshctl_cmd(&home)
        .env("MESHCTL_CONFIG", &path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name = \"Pi lab1\""));
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let home = TempDir::new().unwrap();
    let output = meshctl_cmd(&home)
        .args(["config", "set", "controller.colour", "red"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}
