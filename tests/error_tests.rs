//! Error scenario integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn booth(config_home: &TempDir) -> Command {
    let mut command = Command::cargo_bin("freestyle-booth").unwrap();
    command
        .env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("BOOTH_API_URL")
        .env_remove("BOOTH_TOKEN");
    command
}

#[test]
fn missing_beat_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No beat selected"));
}

#[test]
fn volume_out_of_range_is_rejected() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["--beat-url", "https://cdn.example/b.mp3", "--volume", "150"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--volume"));
}

#[test]
fn beat_and_beat_url_conflict() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["--beat", "b1", "--beat-url", "https://cdn.example/b.mp3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn config_get_unknown_key() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["config", "get", "unknown_key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown key"));
}

#[test]
fn config_set_unknown_key() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["config", "set", "unknown_key", "value"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Valid keys"));
}

#[test]
fn config_set_invalid_volume() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["config", "set", "beat_volume", "loud"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("0 to 100"));
}

#[test]
fn config_set_invalid_boolean() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["config", "set", "force_mono", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'true' or 'false'"));
}

#[test]
fn config_set_invalid_format() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["config", "set", "formats", "flac"])
        .assert()
        .failure();
}

#[test]
fn malformed_config_file_does_not_block_usage_errors() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("freestyle-booth");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "beat_volume = [").unwrap();

    booth(&home)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No beat selected"));
}

#[test]
fn takes_cannot_be_written_to_disk() {
    let home = TempDir::new().unwrap();
    booth(&home)
        .args(["--beat-url", "https://cdn.example/b.mp3", "--output", "take.flac"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--output"));
}
