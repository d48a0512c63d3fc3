//! CLI integration tests for tree-sync.
//!
//! These tests verify command-line argument parsing, help output, the
//! offline `plan` command and exit codes for configuration errors. None of
//! them need a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Get a command for the tree-sync binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("tree-sync").unwrap();
    for var in [
        "TREE_SYNC_PG_HOST",
        "TREE_SYNC_PG_PORT",
        "TREE_SYNC_PG_USER",
        "TREE_SYNC_PG_PASSWORD",
        "TREE_SYNC_PG_DATABASE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn config_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"target:
  host: localhost
  database: giessdenkiez
  user: postgres
  ssl_mode: disable
sync:
  workers: 2
  partitioning:
    start_year: 1990
    end_year: 2010
"#
    )
    .unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("ensure-schema"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--original-table"))
        .stdout(predicate::str::contains("--staging-table"))
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--no-partitioning"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tree-sync"));
}

#[test]
fn test_global_flags_and_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Plan (offline)
// =============================================================================

#[test]
fn test_plan_prints_statements_in_order() {
    let file = config_file();
    let output = cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "CREATE TABLE IF NOT EXISTS \"public\".\"trees\"",
        ))
        .stdout(predicate::str::contains("-- delete: range (1990, 2000]"))
        .stdout(predicate::str::contains("-- update: unknown year"))
        .stdout(predicate::str::contains("-- prune: all records"))
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(output).unwrap();
    let delete = text.find("-- delete:").unwrap();
    let insert = text.find("-- insert:").unwrap();
    let update = text.find("-- update:").unwrap();
    let prune = text.find("-- prune:").unwrap();
    assert!(delete < insert && insert < update && update < prune);
}

#[test]
fn test_plan_json_output() {
    let file = config_file();
    let output = cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--output-json",
            "plan",
            "--workers",
            "5",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["workers"], 5);
    assert_eq!(json["original_table"], "public.trees");
    assert_eq!(json["partitions"].as_array().unwrap().len(), 5);
}

#[test]
fn test_plan_without_partitioning() {
    let file = config_file();
    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "plan",
            "--no-partitioning",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("-- delete: all records"))
        .stdout(predicate::str::contains("range (").not());
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_io_code() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "plan"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_config_code() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_config_code() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sync:").unwrap();
    writeln!(file, "  workers: 2").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(2);
}

#[test]
fn test_unlisted_table_is_rejected() {
    let file = config_file();
    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "plan",
            "--staging-table",
            "pg_authid",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not in the allowed table list"));
}

#[test]
fn test_zero_workers_is_rejected() {
    let file = config_file();
    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "plan",
            "--workers",
            "0",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_invalid_log_format_is_rejected() {
    let file = config_file();
    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--log-format",
            "xml",
            "plan",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_health_check_reports_unreachable_database() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"target:
  host: 127.0.0.1
  port: 1
  database: giessdenkiez
  user: postgres
  ssl_mode: disable
sync:
  workers: 1
"#
    )
    .unwrap();

    let output = cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--output-json",
            "health-check",
        ])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Health check failed"))
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["target_connected"], false);
    assert_eq!(json["healthy"], false);
    assert!(json["target_error"].is_string());
}
