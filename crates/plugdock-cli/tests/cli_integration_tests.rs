//! CLI integration tests for plugdock
//!
//! Exercises the offline commands end-to-end using assert_cmd. Every test
//! points `--config` at its own temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn plugdock_cmd(config: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("plugdock").unwrap();
    cmd.arg("--config").arg(config.path());
    cmd.env_remove("PLUGDOCK_GITHUB_TOKEN");
    cmd.env_remove("GITHUB_TOKEN");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn read_settings(config: &TempDir) -> serde_json::Value {
    let contents = std::fs::read_to_string(config.path().join("settings.json")).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[test]
#[allow(deprecated)]
fn test_help_succeeds() {
    Command::cargo_bin("plugdock")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("remove"));
}

#[test]
#[allow(deprecated)]
fn test_unknown_command_exits_with_one() {
    Command::cargo_bin("plugdock")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .code(1);
}

#[test]
fn test_config_path_points_into_config_dir() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("settings.json"));
}

#[test]
fn test_first_run_creates_default_settings() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verify_checksums = true"))
        .stdout(predicate::str::contains("github_token = (not set)"));

    let settings = read_settings(&config);
    assert_eq!(settings["github_owner"], "");
    assert_eq!(settings["backup_before_update"], true);
    assert_eq!(settings["installed_plugins"], serde_json::json!([]));
    assert!(config.path().join("plugins").is_dir());
}

#[test]
fn test_config_set_persists() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["config", "set", "github_owner", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set github_owner = acme"));
    plugdock_cmd(&config)
        .args(["config", "set", "verify_checksums", "false"])
        .assert()
        .success();

    let settings = read_settings(&config);
    assert_eq!(settings["github_owner"], "acme");
    assert_eq!(settings["verify_checksums"], false);
}

#[test]
fn test_config_set_token_is_redacted() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["config", "set", "github_token", "ghp_secret1234"])
        .assert()
        .success()
        .stdout(predicate::str::contains("***1234"))
        .stdout(predicate::str::contains("ghp_secret").not());
}

#[test]
fn test_config_set_rejects_bad_input() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["config", "set", "colour", "blue"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown configuration key"));
    plugdock_cmd(&config)
        .args(["config", "set", "verify_checksums", "maybe"])
        .assert()
        .code(1);
}

#[test]
fn test_global_overrides_are_saved() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["--owner", "acme", "--repo", "plugins", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/plugins"));

    let settings = read_settings(&config);
    assert_eq!(settings["github_repo"], "plugins");
}

#[test]
fn test_status_with_no_plugins() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("(not configured)"))
        .stdout(predicate::str::contains("No plugins installed."));
}

#[test]
fn test_status_flags_missing_install_path() {
    let config = TempDir::new().unwrap();
    let settings = serde_json::json!({
        "github_owner": "acme",
        "github_repo": "plugins",
        "github_token": null,
        "plugins_directory": config.path().join("plugins"),
        "temp_directory": config.path().join("temp"),
        "auto_create_directories": true,
        "verify_checksums": true,
        "backup_before_update": true,
        "installed_plugins": [{
            "name": "Formatter",
            "version": "v2.0",
            "description": "",
            "author": "acme",
            "download_url": "https://example.com/Formatter.zip",
            "file_name": "Formatter.zip",
            "install_path": config.path().join("plugins/Formatter"),
            "installed_date": "2026-10-18T12:00:00Z",
            "file_size": 10,
            "checksum": null
        }]
    });
    std::fs::write(
        config.path().join("settings.json"),
        serde_json::to_string_pretty(&settings).unwrap(),
    )
    .unwrap();

    plugdock_cmd(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Formatter v2.0 [MISSING]"));
}

#[test]
fn test_install_without_repository_fails() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["install", "--name", "Formatter"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No release repository configured"));
}

#[test]
fn test_remove_not_installed_fails() {
    let config = TempDir::new().unwrap();

    plugdock_cmd(&config)
        .args(["remove", "--name", "Formatter"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn test_malformed_settings_are_left_alone() {
    let config = TempDir::new().unwrap();
    let path = config.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    plugdock_cmd(&config)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file error"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}
