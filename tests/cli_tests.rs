// Command-line surface tests for the warm-transfer binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn warm_transfer(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("warm-transfer").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();

    warm_transfer(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_serve_help_documents_overrides() {
    let dir = tempfile::tempdir().unwrap();

    warm_transfer(&dir)
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--mode"));
}

#[test]
fn test_config_output_redacts_auth_token() {
    let dir = tempfile::tempdir().unwrap();

    warm_transfer(&dir)
        .arg("config")
        .env("TWILIO_ACCOUNT_SID", "AC-cli")
        .env("TWILIO_AUTH_TOKEN", "super-secret-token")
        .env("OPERATING_MODE", "testing")
        .assert()
        .success()
        .stdout(predicate::str::contains("AC-cli"))
        .stdout(predicate::str::contains("mode = \"TESTING\""))
        .stdout(predicate::str::contains("super-secret-token").not());
}

#[test]
fn test_config_reads_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("branch.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "public_url = \"https://tuc.example.com\"\n\n[tenancy]\nbranch = \"tuc\"\n"
    )
    .unwrap();

    warm_transfer(&dir)
        .args(["--config", path.to_str().unwrap(), "config"])
        .env_remove("BRANCH_NAME")
        .env_remove("PUBLIC_URL")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://tuc.example.com"))
        .stdout(predicate::str::contains("branch = \"tuc\""));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    warm_transfer(&dir)
        .args(["--config", "does-not-exist.toml", "config"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_mode_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    warm_transfer(&dir)
        .args(["serve", "--mode", "loud"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown operating mode"));
}
