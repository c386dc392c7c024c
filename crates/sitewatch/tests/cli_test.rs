//! Integration tests for the `sitewatch` CLI binary.
//!
//! Argument parsing, help output, completions, offline decoding and
//! error exit codes, all without a live broker.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const SAMPLE_TOPIC: &str = "PLCNEXT/7_NorthSite/CH12";
const SAMPLE_PAYLOAD: &str = r#"{"rCH12_mA":"1.55E+01","rCH12_PV":"2.30E+01","iCH12_DetStatus":"0","iCH12_DetType":"1","strCH12_TAG":"KGD-007"}"#;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `sitewatch` binary with env isolation.
///
/// Clears all `SITEWATCH_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn sitewatch_cmd_in(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("sitewatch");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("SITEWATCH_PROFILE")
        .env_remove("SITEWATCH_HOST")
        .env_remove("SITEWATCH_PORT")
        .env_remove("SITEWATCH_USERNAME")
        .env_remove("SITEWATCH_PASSWORD")
        .env_remove("SITEWATCH_OUTPUT");
    cmd
}

fn sitewatch_cmd() -> assert_cmd::Command {
    sitewatch_cmd_in(Path::new("/tmp/sitewatch-cli-test-nonexistent"))
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = sitewatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    sitewatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("MQTT")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("sites"))
            .and(predicate::str::contains("decode")),
    );
}

#[test]
fn test_version_flag() {
    sitewatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sitewatch"));
}

#[test]
fn test_invalid_subcommand() {
    sitewatch_cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    sitewatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sitewatch"));
}

#[test]
fn test_completions_zsh() {
    sitewatch_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Offline decode ──────────────────────────────────────────────────

#[test]
fn test_decode_sample_as_json() {
    let output = sitewatch_cmd()
        .args(["decode", "--topic", SAMPLE_TOPIC, SAMPLE_PAYLOAD, "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let reading: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reading["site_id"], 7);
    assert_eq!(reading["site_name"], "NorthSite");
    assert_eq!(reading["channel_id"], "CH12");
    assert_eq!(reading["tag"], "KGD-007");
    assert_eq!(reading["process_value"], 23.0);
    assert_eq!(reading["current_ma"], 15.5);
    assert_eq!(reading["detector_type"], "gas_lel");
    assert_eq!(reading["status"], "normal");
    assert_eq!(reading["topic"], SAMPLE_TOPIC);
}

#[test]
fn test_decode_reads_stdin() {
    sitewatch_cmd()
        .args(["decode", "-t", SAMPLE_TOPIC, "-o", "plain"])
        .write_stdin(SAMPLE_PAYLOAD)
        .assert()
        .success()
        .stdout(predicate::str::contains("7_CH12_KGD-007"));
}

#[test]
fn test_decode_table_detail() {
    sitewatch_cmd()
        .args(["decode", "-t", "7_NorthSite/CH12", SAMPLE_PAYLOAD])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Gas Detector (%LEL)")
                .and(predicate::str::contains("PLCNEXT/7_NorthSite/CH12")),
        );
}

#[test]
fn test_decode_rejects_payload_without_channel() {
    sitewatch_cmd()
        .args(["decode", "-t", SAMPLE_TOPIC, r#"{"hello":"world"}"#])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("sitewatch::rejected"));
}

#[test]
fn test_decode_rejects_out_of_range_status() {
    let payload = SAMPLE_PAYLOAD.replace(r#""iCH12_DetStatus":"0""#, r#""iCH12_DetStatus":"15""#);
    sitewatch_cmd()
        .args(["decode", "-t", SAMPLE_TOPIC, &payload])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_decode_rejects_bad_topic() {
    sitewatch_cmd()
        .args(["decode", "-t", "PLCNEXT/NoId/CH1", SAMPLE_PAYLOAD])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Message rejected"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path() {
    sitewatch_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_show_masks_password() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join(".config").join("sitewatch");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        r#"
default_profile = "plant"

[profiles.plant]
host = "broker.plant"
username = "scada"
password = "hunter2"
"#,
    )
    .unwrap();

    sitewatch_cmd_in(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("host = \"broker.plant\"")
                .and(predicate::str::contains("[profiles.plant]  # active"))
                .and(predicate::str::contains("hunter2").not()),
        );
}

#[test]
fn test_unknown_profile_is_reported() {
    let output = sitewatch_cmd()
        .args(["sites", "--profile", "nope", "-d", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Profile 'nope' not found"));
}

// ── Connection errors ───────────────────────────────────────────────

#[test]
fn test_unreachable_broker_exits_with_connection_code() {
    // port 1 on loopback refuses immediately
    sitewatch_cmd()
        .args(["sites", "-H", "127.0.0.1", "-P", "1", "-d", "0"])
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("Could not connect to MQTT broker"));
}
