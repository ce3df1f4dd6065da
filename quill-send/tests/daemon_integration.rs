//! Integration tests for the quill-send daemon binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Create a config pointing at a fresh database inside a tempdir
fn setup_test_env() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();

    let config_dir = temp_dir.path().join("config");
    let data_dir = temp_dir.path().join("data");
    let media_dir = temp_dir.path().join("media");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(&data_dir).unwrap();
    fs::create_dir_all(&media_dir).unwrap();

    let config_path = config_dir.join("config.toml");
    let db_path = data_dir.join("queue.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[platform]
api_base = "https://api.invalid.test"
client_id = "test-client"
client_secret = "test-secret"
request_timeout_secs = 2

[media]
directory = "{}"

[scheduling]
poll_interval = 60
"#,
        escape_path_for_toml(&db_path.to_string_lossy()),
        escape_path_for_toml(&media_dir.to_string_lossy())
    );

    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_string_lossy().to_string())
}

#[test]
fn test_help_shows_flags() {
    let mut cmd = Command::cargo_bin("quill-send").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--poll-interval"))
        .stdout(predicate::str::contains("--once"));
}

#[test]
fn test_once_with_empty_queue_exits_cleanly() {
    let (_temp_dir, config_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("quill-send").unwrap();

    cmd.env("QUILLCAST_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success();
}

#[test]
fn test_missing_config_is_an_error() {
    let mut cmd = Command::cargo_bin("quill-send").unwrap();

    cmd.env("QUILLCAST_CONFIG", "/nonexistent/quillcast.toml")
        .arg("--once")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_once_creates_database_file() {
    let (temp_dir, config_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("quill-send").unwrap();
    cmd.env("QUILLCAST_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success();

    assert!(temp_dir.path().join("data").join("queue.db").exists());
}
