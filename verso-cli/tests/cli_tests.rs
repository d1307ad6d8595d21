//! Integration tests for the verso CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CHANGELOG: &str = r#"
[[log]]
id = "create-users"
author = "alice"

[[log.changes]]
type = "create-table"
table = "USERS"

[[log]]
id = "seed-users"
author = "alice"

[[log.changes]]
type = "insert"
table = "USERS"
columns = [{ name = "name", value = "Alice" }]
"#;

/// Get the verso binary, isolated from the caller's environment
#[allow(deprecated)]
fn verso_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("verso").unwrap();
    cmd.current_dir(dir);
    for var in [
        "VERSO_CHANGELOG",
        "VERSO_DB_TYPE",
        "VERSO_HOST",
        "VERSO_PORT",
        "VERSO_REPLICAS",
        "VERSO_DATABASE",
        "VERSO_USERNAME",
        "VERSO_PASSWORD",
        "VERSO_ENABLE_SSL",
        "VERSO_UPDATE_CHECKSUMS",
        "VERSO_CONFIG",
        "VERSO_DEBUG",
        "VERSO_LOG_LEVEL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_changelog(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("changelog.toml");
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    verso_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Verso"))
        .stdout(predicate::str::contains("--changelog"))
        .stdout(predicate::str::contains("--db-type"))
        .stdout(predicate::str::contains("--replicas"))
        .stdout(predicate::str::contains("--update-checksums"));
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    verso_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_changelog_fails() {
    let dir = TempDir::new().unwrap();
    verso_cmd(dir.path())
        .args(["--db-type", "memory"])
        .assert()
        .code(255)
        .stderr(predicate::str::contains("No change log given"));
}

#[test]
fn test_invalid_db_type_fails() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(&dir, CHANGELOG);
    verso_cmd(dir.path())
        .args(["--changelog", &changelog, "--db-type", "oracle"])
        .assert()
        .code(255);
}

#[test]
fn test_unknown_flag_fails() {
    let dir = TempDir::new().unwrap();
    verso_cmd(dir.path())
        .arg("--bogus")
        .assert()
        .code(255);
}

#[test]
fn test_memory_run_succeeds() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(&dir, CHANGELOG);
    verso_cmd(dir.path())
        .args(["--changelog", &changelog, "--db-type", "memory", "--no-banner"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Executed"))
        .stdout(predicate::str::contains("applied successfully"));
}

#[test]
fn test_banner_printed() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(&dir, CHANGELOG);
    verso_cmd(dir.path())
        .args(["--changelog", &changelog, "--db-type", "memory"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verso"));
}

#[test]
fn test_config_file_is_used() {
    let dir = TempDir::new().unwrap();
    write_changelog(&dir, CHANGELOG);
    fs::write(
        dir.path().join("verso.toml"),
        "changelog = \"changelog.toml\"\n\n[database]\ndb_type = \"memory\"\n",
    )
    .unwrap();

    verso_cmd(dir.path())
        .arg("--no-banner")
        .assert()
        .success()
        .stdout(predicate::str::contains("changelog.toml"))
        .stdout(predicate::str::contains("memory"));
}

#[test]
fn test_env_vars_are_used() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(&dir, CHANGELOG);
    verso_cmd(dir.path())
        .env("VERSO_CHANGELOG", &changelog)
        .env("VERSO_DB_TYPE", "memory")
        .arg("--no-banner")
        .assert()
        .success();
}

#[test]
fn test_duplicate_changeset_ids_fail() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{}\n[[log]]\nid = \"seed-users\"\nauthor = \"bob\"\n\n[[log.changes]]\ntype = \"create-table\"\ntable = \"ROLES\"\n",
        CHANGELOG
    );
    let changelog = write_changelog(&dir, &content);
    verso_cmd(dir.path())
        .args(["--changelog", &changelog, "--db-type", "memory", "--no-banner"])
        .assert()
        .code(255)
        .stderr(predicate::str::contains("Duplicate changeset id"));
}

#[test]
fn test_failing_changeset_reported() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{}{}",
        CHANGELOG,
        r#"
[[log]]
id = "delete-everything"
author = "mallory"

[[log.changes]]
type = "query"
query = "{ \"delete\": \"${change.table}\" }"
template = true
"#
    );
    let changelog = write_changelog(&dir, &content);
    verso_cmd(dir.path())
        .args(["--changelog", &changelog, "--db-type", "memory", "--no-banner"])
        .assert()
        .code(255)
        .stderr(predicate::str::contains("Changeset 'delete-everything' failed"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    verso_cmd(dir.path())
        .args(["--config", "missing.toml"])
        .assert()
        .code(255)
        .stderr(predicate::str::contains("Failed to read"));
}
