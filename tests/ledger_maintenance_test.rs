use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn ledger_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("booking-ledger");
    cmd.current_dir(home)
        .env("LEDGER_HOME", home)
        .env("LEDGER_EXPORT_ENABLED", "0")
        .env("LEDGER_LOG", "warn")
        .env_remove("LEDGER_SAVE_DIR")
        .env_remove("LEDGER_FILE")
        .env_remove("LEDGER_CONFIG_PATH");
    cmd
}

fn write_ledger(home: &Path, text: &str) -> std::path::PathBuf {
    let ledger = home.join("output/booking_info.md");
    fs::create_dir_all(ledger.parent().expect("parent")).expect("mkdir output");
    fs::write(&ledger, text).expect("write ledger");
    ledger
}

const OUT_OF_ORDER: &str = "## 2026-02-14\n\n### 10: _abc_\nbody\n\n## 2026-02-15\n\n### 5: _e_\n";
const BROKEN: &str = "stray preamble\n\n## 2026-02-14\n\n### oops: _bad_\n\n### 10: _abc_\nbody\n";

#[test]
fn verify_reports_unreadable_segments() {
    let tmp = tempdir().expect("tempdir");
    write_ledger(tmp.path(), BROKEN);

    ledger_cmd(tmp.path())
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("preamble"))
        .stdout(predicate::str::contains("malformed_header"));
}

#[test]
fn verify_strict_flags_non_canonical_order() {
    let tmp = tempdir().expect("tempdir");
    write_ledger(tmp.path(), OUT_OF_ORDER);

    ledger_cmd(tmp.path())
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.canonical=false"));
    ledger_cmd(tmp.path())
        .args(["verify", "--strict"])
        .assert()
        .failure();
}

#[test]
fn repair_rewrites_ledger_in_canonical_form() {
    let tmp = tempdir().expect("tempdir");
    let ledger = write_ledger(tmp.path(), BROKEN);

    ledger_cmd(tmp.path())
        .arg("repair")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.rewritten=true"));

    assert_eq!(
        fs::read_to_string(&ledger).expect("read"),
        "## 2026-02-14\n\n### 10: _abc_\nbody\n"
    );
    ledger_cmd(tmp.path())
        .args(["verify", "--strict"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.canonical=true"));
}

#[test]
fn repair_sorts_dates_descending() {
    let tmp = tempdir().expect("tempdir");
    let ledger = write_ledger(tmp.path(), OUT_OF_ORDER);

    ledger_cmd(tmp.path()).arg("repair").assert().success();
    assert_eq!(
        fs::read_to_string(&ledger).expect("read"),
        "## 2026-02-15\n\n### 5: _e_\n\n## 2026-02-14\n\n### 10: _abc_\nbody\n"
    );
}

#[test]
fn status_reports_missing_then_present_ledger() {
    let tmp = tempdir().expect("tempdir");

    ledger_cmd(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.exists=false"));

    write_ledger(tmp.path(), OUT_OF_ORDER);
    ledger_cmd(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.dates=2"))
        .stdout(predicate::str::contains("ledger.entries=2"))
        .stdout(predicate::str::contains("ledger.latest_date=2026-02-15"))
        .stdout(predicate::str::contains("ledger.latest_entry=5: _e_"));
}

#[test]
fn export_without_ledger_fails() {
    let tmp = tempdir().expect("tempdir");
    ledger_cmd(tmp.path())
        .arg("export")
        .assert()
        .failure()
        .stdout(predicate::str::contains("ledger file does not exist"));
}

#[test]
fn missing_ledger_verifies_as_empty() {
    let tmp = tempdir().expect("tempdir");
    ledger_cmd(tmp.path())
        .args(["verify", "--strict"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.entries=0"))
        .stdout(predicate::str::contains("ledger.empty=true"));
}
