//! End-to-end tests for the CLI binary.

#[allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin("massilia").unwrap()
}

#[test]
fn test_cli_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EVM assembly optimizer"));
}

#[test]
fn test_cli_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("massilia"));
}

#[test]
fn test_cli_optimizes_stdin() {
    cmd()
        .write_stdin("push 3\npush 5\nadd\n")
        .assert()
        .success()
        .stdout("push 0x8\n");
}

#[test]
fn test_cli_reads_file() {
    let path = std::env::temp_dir().join("massilia_cli_test.asm");
    std::fs::write(&path, "push 0\nadd\n").unwrap();
    cmd()
        .arg(path.to_str().unwrap())
        .assert()
        .success()
        .stdout("");
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_cli_json_output() {
    cmd()
        .args(["--format", "json"])
        .write_stdin("push 3\npush 5\nadd\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""Push": "0x8""#));
}

#[test]
fn test_cli_stats_on_stderr() {
    cmd()
        .arg("--stats")
        .write_stdin("push 3\npush 5\nadd\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("3 items in, 1 items out"));
}

#[test]
fn test_cli_verbose_enables_debug_logging() {
    cmd()
        .env_remove("RUST_LOG")
        .arg("-vv")
        .write_stdin("push 3\npush 5\nadd\n")
        .assert()
        .success()
        .stdout("push 0x8\n")
        .stderr(predicate::str::contains("block shrank from 3 to 1 items"));
}

#[test]
fn test_cli_quiet_by_default() {
    cmd()
        .env_remove("RUST_LOG")
        .write_stdin("push 3\npush 5\nadd\n")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_cli_rejects_bad_mnemonic() {
    cmd()
        .write_stdin("frobnicate\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown mnemonic"));
}
