//! End-to-end tests driving the `s3p` binary
//!
//! Only commands that never reach the network are exercised here; store
//! operations are covered by the command modules against `MemoryStore`.

use std::process::{Command, Output};

use tempfile::TempDir;

fn s3p(config_dir: &TempDir, args: &[&str]) -> Output {
    s3p_with_env(config_dir, args, &[])
}

fn s3p_with_env(config_dir: &TempDir, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_s3p"));
    command
        .args(args)
        .env("S3P_CONFIG_DIR", config_dir.path())
        .env_remove("RUST_LOG")
        .env_remove("NO_COLOR");
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("failed to run s3p")
}

#[test]
fn config_show_defaults_as_json() {
    let dir = TempDir::new().unwrap();
    let output = s3p(&dir, &["config", "show", "--json"]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["store"]["region"], "us-east-1");
    assert_eq!(json["transfer"]["chunk_size"], 8 * 1024 * 1024);
    assert_eq!(json["transfer"]["concurrency"], 10);
}

#[test]
fn config_set_persists_and_masks_secret() {
    let dir = TempDir::new().unwrap();
    for (key, value) in [
        ("store.endpoint", "http://localhost:9000"),
        ("store.access_key", "minio"),
        ("store.secret_key", "minio123"),
        ("transfer.concurrency", "4"),
    ] {
        let output = s3p(&dir, &["config", "set", key, value]);
        assert!(output.status.success(), "setting {key} failed");
    }
    assert!(dir.path().join("config.toml").exists());

    let output = s3p(&dir, &["config", "show", "--json"]);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["store"]["endpoint"], "http://localhost:9000");
    assert_eq!(json["store"]["secret_key"], "********");
    assert_eq!(json["transfer"]["concurrency"], 4);
}

#[test]
fn config_set_rejects_bad_values() {
    let dir = TempDir::new().unwrap();

    let output = s3p(&dir, &["config", "set", "transfer.chunk_size", "0"]);
    assert_eq!(output.status.code(), Some(2));

    let output = s3p(&dir, &["config", "set", "nope", "1"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn invalid_flag_value_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = s3p(&dir, &["ls", "s3://bucket", "--chunk-size", "lots"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn completions_for_zsh() {
    let dir = TempDir::new().unwrap();
    let output = s3p(&dir, &["completions", "zsh"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("#compdef s3p"));
}

#[test]
fn no_color_env_var_is_accepted() {
    let dir = TempDir::new().unwrap();
    for value in ["1", "true", ""] {
        let output = s3p_with_env(&dir, &["config", "show", "--json"], &[("NO_COLOR", value)]);
        assert!(
            output.status.success(),
            "NO_COLOR={value:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["store"]["region"], "us-east-1");
    }
}
