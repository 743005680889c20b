//! CLI integration tests for schema-convert.
//!
//! These tests verify command-line argument parsing, help output,
//! offline conversion of a dump and exit codes for error conditions.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Get a command for the schema-convert binary.
fn cmd() -> Command {
    Command::cargo_bin("schema-convert").unwrap()
}

const PG_DUMP: &str = r#"
CREATE TABLE public.customers (
    id integer NOT NULL,
    email character varying(255) NOT NULL,
    created_at timestamp with time zone DEFAULT now()
);

CREATE TABLE public.events (
    payload jsonb,
    location point
);

ALTER TABLE ONLY public.customers
    ADD CONSTRAINT customers_pkey PRIMARY KEY (id);
"#;

/// Write a dump and a config without a verifier into `dir`.
fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let dump = dir.join("shop.sql");
    std::fs::write(&dump, PG_DUMP).unwrap();

    let config = dir.join("config.yaml");
    let mut file = std::fs::File::create(&config).unwrap();
    write!(
        file,
        "source:\n  dialect: postgres\n  dump: {}\ntarget:\n  dialect: google_sql\nconversion:\n  output_prefix: {}\n",
        dump.display(),
        dir.join("out").display()
    )
    .unwrap();
    config
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
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_convert_subcommand_help() {
    cmd()
        .args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--prefix"));
}

#[test]
fn test_resume_requires_session() {
    cmd()
        .arg("resume")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--session"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema-convert"));
}

// =============================================================================
// Configuration Errors
// =============================================================================

#[test]
fn test_missing_config_file() {
    cmd()
        .args(["-c", "/nonexistent/config.yaml", "validate"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source: [not: valid").unwrap();

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(1);
}

#[test]
fn test_config_without_source_input() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:\n  dialect: mysql\n").unwrap();

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("source"));
}

#[test]
fn test_validate_good_config() {
    let dir = TempDir::new().unwrap();
    let config = write_fixture(dir.path());

    cmd()
        .args(["-c", config.to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Verifier: none"));
}

// =============================================================================
// Offline Conversion
// =============================================================================

#[test]
fn test_convert_writes_outputs() {
    let dir = TempDir::new().unwrap();
    let config = write_fixture(dir.path());

    cmd()
        .args(["-c", config.to_str().unwrap(), "convert"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema conversion report"))
        .stdout(predicate::str::contains("Synthetic keys:"))
        .stdout(predicate::str::contains("events.synth_id"));

    let ddl = std::fs::read_to_string(dir.path().join("out.ddl.sql")).unwrap();
    assert!(ddl.contains("CREATE TABLE `customers`"));
    assert!(ddl.contains("PRIMARY KEY (`synth_id`)"));
    assert!(dir.path().join("out.session.json").exists());

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("out.report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["summary"]["tables"], 2);
    // No verifier configured: both defaults stay unverified
    assert_eq!(report["summary"]["expressions_verified"], 0);
    assert_eq!(report["summary"]["expressions_unverified"], 2);
}

#[test]
fn test_convert_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = write_fixture(dir.path());

    cmd()
        .args(["-c", config.to_str().unwrap(), "--output-json", "convert", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"synthetic_keys\""));

    assert!(!dir.path().join("out.ddl.sql").exists());
    assert!(!dir.path().join("out.session.json").exists());
}

#[test]
fn test_report_from_session() {
    let dir = TempDir::new().unwrap();
    let config = write_fixture(dir.path());
    cmd()
        .args(["-c", config.to_str().unwrap(), "convert"])
        .assert()
        .success();

    let session = dir.path().join("out.session.json");
    cmd()
        .args(["report", "--session", session.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 tables"));
}

#[test]
fn test_resume_from_session() {
    let dir = TempDir::new().unwrap();
    let config = write_fixture(dir.path());
    cmd()
        .args(["-c", config.to_str().unwrap(), "convert"])
        .assert()
        .success();

    let session = dir.path().join("out.session.json");
    let prefix = dir.path().join("resumed");
    cmd()
        .args([
            "-c",
            config.to_str().unwrap(),
            "resume",
            "--session",
            session.to_str().unwrap(),
            "--prefix",
            prefix.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert!(dir.path().join("resumed.ddl.sql").exists());
}

// =============================================================================
// Session Errors
// =============================================================================

#[test]
fn test_resume_corrupt_session() {
    let dir = TempDir::new().unwrap();
    let config = write_fixture(dir.path());
    let session = dir.path().join("broken.session.json");
    std::fs::write(&session, "{ this is not json").unwrap();

    cmd()
        .args([
            "-c",
            config.to_str().unwrap(),
            "resume",
            "--session",
            session.to_str().unwrap(),
        ])
        .assert()
        .code(3);
}

#[test]
fn test_report_newer_session_version() {
    let dir = TempDir::new().unwrap();
    let session = dir.path().join("future.session.json");
    std::fs::write(
        &session,
        r#"{"format": "schema-convert/session", "version": 99, "conv": {}}"#,
    )
    .unwrap();

    cmd()
        .args(["report", "--session", session.to_str().unwrap()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("99"));
}
