//! End-to-end tests for the arca binary

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn arca() -> Command {
    Command::cargo_bin("arca").unwrap()
}

#[test]
fn test_compress_extract_roundtrip() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("notes.txt");
    let archive = temp.path().join("notes.zip");
    let out_dir = temp.path().join("out");

    fs::write(&input, b"cli roundtrip").unwrap();

    arca()
        .arg("--quiet")
        .arg("compress")
        .arg(&input)
        .arg("-o")
        .arg(&archive)
        .assert()
        .success()
        .code(0);
    assert!(archive.exists());

    arca()
        .arg("--quiet")
        .arg("extract")
        .arg(&archive)
        .arg("-o")
        .arg(&out_dir)
        .assert()
        .success();

    assert_eq!(fs::read(out_dir.join("notes.txt")).unwrap(), b"cli roundtrip");
}

#[test]
fn test_encrypted_extract_without_password_exits_2() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("secret.txt");
    let archive = temp.path().join("secret.zip");

    fs::write(&input, b"classified").unwrap();

    arca()
        .arg("--quiet")
        .arg("compress")
        .arg(&input)
        .arg("-o")
        .arg(&archive)
        .arg("--password")
        .arg("hunter2")
        .assert()
        .success();

    arca()
        .arg("--quiet")
        .arg("extract")
        .arg(&archive)
        .arg("-o")
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_compress_to_rar_fails() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("a.txt");
    fs::write(&input, b"a").unwrap();

    arca()
        .arg("--quiet")
        .arg("compress")
        .arg(&input)
        .arg("-o")
        .arg(temp.path().join("a.rar"))
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_list_json_output() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("listed.txt");
    let archive = temp.path().join("listed.zip");
    fs::write(&input, b"listing").unwrap();

    arca()
        .arg("--quiet")
        .arg("compress")
        .arg(&input)
        .arg("-o")
        .arg(&archive)
        .assert()
        .success();

    arca()
        .arg("--quiet")
        .arg("list")
        .arg(&archive)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("listed.txt"));
}

#[test]
fn test_integrity_check_reports_ok() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("fine.txt");
    let archive = temp.path().join("fine.7z");
    fs::write(&input, b"still fine").unwrap();

    arca()
        .arg("--quiet")
        .arg("compress")
        .arg(&input)
        .arg("-o")
        .arg(&archive)
        .arg("-f")
        .arg("7z")
        .assert()
        .success();

    arca()
        .arg("--quiet")
        .arg("test")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn test_dispatch_compress_message() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("from-menu.txt");
    fs::write(&input, b"dispatched").unwrap();

    let message = format!(
        "arca://compress?files={}&type=tar&level=normal&usePassword=false",
        input.display().to_string().replace('/', "%2F")
    );

    arca()
        .arg("--quiet")
        .arg("dispatch")
        .arg(&message)
        .assert()
        .success();

    assert!(temp.path().join("from-menu.tar").exists());
}
