//! Integration tests for the `wifimgr` binary.
//!
//! Argument parsing, exit codes, and a full diff/apply/rollback cycle
//! against a fixture-backed API in a temp directory.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `wifimgr` binary with env isolation.
///
/// Clears all `WIFIMGR_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn wifimgr_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("wifimgr");
    cmd.env("HOME", "/tmp/wifimgr-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/wifimgr-cli-test-nonexistent")
        .env("XDG_CACHE_HOME", "/tmp/wifimgr-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("WIFIMGR_CONFIG")
        .env_remove("WIFIMGR_OUTPUT")
        .env_remove("WIFIMGR_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const FIXTURE: &str = r#"{
  "vendor": "mist",
  "sites": [{ "id": "site-lab", "name": "LAB-01" }],
  "inventory": [
    { "mac": "aabbccddeeff", "type": "ap", "id": "dev-2", "name": "AP-2", "site_id": "site-lab" }
  ],
  "devices": [
    {
      "id": "dev-2", "mac": "aabbccddeeff", "type": "ap", "site_id": "site-lab", "name": "AP-2",
      "config": { "radio_config": { "band_5": { "channel": 40 } } }
    }
  ]
}"#;

const INTENT: &str = "\
version: 1
config:
  sites:
    LAB-01:
      api: lab
      devices:
        ap:
          \"aa:bb:cc:dd:ee:ff\":
            radio_config:
              band_5:
                channel: 36
";

const CONFIG: &str = r#"
[paths]
cache_dir = "cache"
intent_dir = "intent"

[apis.lab]
vendor = "mist"
adapter = "fixture"
fixture = "fixture.json"
"#;

/// Temp workspace with a config, a fixture-backed API and one intent file.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), CONFIG).unwrap();
        std::fs::write(dir.path().join("fixture.json"), FIXTURE).unwrap();
        std::fs::create_dir_all(dir.path().join("intent")).unwrap();
        std::fs::write(dir.path().join("intent/lab.yaml"), INTENT).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = wifimgr_cmd();
        cmd.arg("--config").arg(self.config());
        cmd
    }
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = wifimgr_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_flag() {
    wifimgr_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("WiFi")
            .and(predicate::str::contains("diff"))
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("rollback")),
    );
}

#[test]
fn test_version_flag() {
    wifimgr_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wifimgr"));
}

#[test]
fn test_invalid_subcommand() {
    wifimgr_cmd().arg("frobnicate").assert().code(2);
}

#[test]
fn test_apply_requires_device_type() {
    let output = wifimgr_cmd().args(["apply", "LAB-01"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("DEVICE_TYPE"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    wifimgr_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    wifimgr_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wifimgr"));
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_no_config_exits_with_config_code() {
    let output = wifimgr_cmd().arg("apis").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("No APIs"));
}

#[test]
fn test_malformed_config_exits_with_config_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[apis.lab\nvendor = ").unwrap();
    wifimgr_cmd()
        .arg("--config")
        .arg(&path)
        .arg("apis")
        .assert()
        .code(3);
}

#[test]
fn test_unknown_api_override() {
    let ws = Workspace::new();
    let output = ws
        .cmd()
        .args(["diff", "LAB-01", "ap", "--api", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("nope"));
}

// ── Fixture-backed workflow ─────────────────────────────────────────

#[test]
fn test_apis_lists_fixture_api() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["apis", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"label\": \"lab\"").and(predicate::str::contains("mist")));
}

#[test]
fn test_refresh_then_sites_and_device() {
    let ws = Workspace::new();
    ws.cmd().arg("refresh").assert().success();
    assert!(ws.path().join("cache").read_dir().unwrap().next().is_some());

    ws.cmd()
        .args(["sites", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LAB-01").and(predicate::str::contains("site-lab")));

    ws.cmd()
        .args(["device", "AA-BB-CC-DD-EE-FF"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aa:bb:cc:dd:ee:ff").and(predicate::str::contains("LAB-01")));

    ws.cmd()
        .args(["device", "00:00:00:00:00:01"])
        .assert()
        .code(4);
}

#[test]
fn test_diff_apply_converge_and_rollback() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["diff", "LAB-01", "ap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("band_5").and(predicate::str::contains("1 to update")));

    // Without --yes and without a terminal, apply refuses to prompt.
    ws.cmd().args(["apply", "LAB-01", "ap"]).assert().code(2);

    ws.cmd()
        .args(["apply", "LAB-01", "ap", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would write 1 device(s)"));
    assert!(!ws.path().join("intent/lab.yaml.0").exists());

    ws.cmd()
        .args(["-y", "apply", "LAB-01", "ap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 1 device(s)"));
    assert!(ws.path().join("intent/lab.yaml.0").exists());
    let fixture = std::fs::read_to_string(ws.path().join("fixture.json")).unwrap();
    assert!(fixture.contains("36"));

    ws.cmd()
        .args(["diff", "LAB-01", "ap", "--refresh", "always"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 to update"));

    let output = ws
        .cmd()
        .args(["backups", "list", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["serial"], 0);

    ws.cmd()
        .args(["-y", "rollback", "LAB-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored LAB-01"));
}

#[test]
fn test_backups_validate_without_config() {
    let ws = Workspace::new();
    wifimgr_cmd()
        .arg("backups")
        .arg("validate")
        .arg(ws.path().join("intent/lab.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 site(s) [LAB-01]"));

    let broken = ws.path().join("broken.yaml.0");
    std::fs::write(&broken, "version: [").unwrap();
    wifimgr_cmd()
        .arg("backups")
        .arg("validate")
        .arg(&broken)
        .assert()
        .code(10);
}

#[test]
fn test_unknown_site_is_unresolved() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["diff", "NOWHERE", "ap", "--api", "lab"])
        .assert()
        .failure();
}
