//! Round-trip tests across the writable formats

use std::fs;

use arca_core::{
    inspect, summarize, verify, ArchiveFormat, Error, OperationObserver, OperationRequest,
    Orchestrator, Outcome, Settings,
};
use arca_testing::{assertions, fixtures, TestDir};

struct QuietObserver;

impl OperationObserver for QuietObserver {
    fn on_progress(&mut self, _fraction: f64) {}
    fn on_success(&mut self) {}
    fn on_failure(&mut self, _error: &Error) {}
}

fn run(settings: Settings, request: OperationRequest) -> Outcome {
    Orchestrator::new(settings).run(request, &mut QuietObserver)
}

fn password_settings(password: &str) -> Settings {
    Settings {
        use_password: true,
        password: password.to_string(),
        ..Settings::default()
    }
}

#[test]
fn test_zip_mixed_inputs_roundtrip() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_mixed_inputs(&test_dir).unwrap();
    let archive = test_dir.path().join("archive.zip");

    let outcome = run(
        Settings::default(),
        OperationRequest::Compress {
            inputs: vec![test_dir.path().join("a.txt"), test_dir.path().join("sub")],
            destination: archive.clone(),
            format: ArchiveFormat::Zip,
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    // The archive carries the loose file by name and the directory's files
    // under the directory name.
    let entries = inspect(&archive, &Settings::default()).unwrap();
    let mut names: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a.txt", "sub/b.txt"]);

    let summary = summarize(&archive, &Settings::default()).unwrap();
    assert_eq!(summary.item_count, 2);
    assert_eq!(summary.total_size, 30);
    assert!(!summary.encrypted);

    let extract_dir = test_dir.path().join("extracted");
    let outcome = run(
        Settings::default(),
        OperationRequest::Decompress {
            source: archive,
            destination: extract_dir.clone(),
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    assert_eq!(fs::read(extract_dir.join("a.txt")).unwrap(), b"0123456789");
    assert_eq!(
        fs::read(extract_dir.join("sub/b.txt")).unwrap(),
        b"01234567890123456789"
    );
}

#[test]
fn test_zip_password_roundtrip() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_nested_tree(&test_dir).unwrap();
    let source_dir = test_dir.path().join("docs");
    let archive = test_dir.path().join("docs.zip");

    let outcome = run(
        password_settings("correct horse"),
        OperationRequest::Compress {
            inputs: vec![source_dir.clone()],
            destination: archive.clone(),
            format: ArchiveFormat::Zip,
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    // Listing works without the password and reports the encryption.
    let summary = summarize(&archive, &Settings::default()).unwrap();
    assert!(summary.encrypted);

    let extract_dir = test_dir.path().join("extracted");
    let outcome = run(
        password_settings("correct horse"),
        OperationRequest::Decompress {
            source: archive.clone(),
            destination: extract_dir.clone(),
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);
    assertions::assert_same_files(&source_dir, &extract_dir.join("docs"));

    // A wrong password is rejected, not silently extracted.
    let wrong_dir = test_dir.path().join("wrong");
    let outcome = run(
        password_settings("wrong password"),
        OperationRequest::Decompress {
            source: archive,
            destination: wrong_dir,
        },
    );
    match outcome {
        Outcome::Failed(message) => assert!(message.contains("password was rejected")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_sevenz_password_roundtrip() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_mixed_inputs(&test_dir).unwrap();
    let archive = test_dir.path().join("archive.7z");

    let outcome = run(
        password_settings("sieben"),
        OperationRequest::Compress {
            inputs: vec![test_dir.path().join("a.txt"), test_dir.path().join("sub")],
            destination: archive.clone(),
            format: ArchiveFormat::SevenZip,
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    // No password configured: refused before any extraction side effects.
    let refused_dir = test_dir.path().join("refused");
    let outcome = run(
        Settings::default(),
        OperationRequest::Decompress {
            source: archive.clone(),
            destination: refused_dir.clone(),
        },
    );
    assert_eq!(outcome, Outcome::PasswordRequired);
    assertions::assert_dir_empty(&refused_dir);

    let extract_dir = test_dir.path().join("extracted");
    let outcome = run(
        password_settings("sieben"),
        OperationRequest::Decompress {
            source: archive,
            destination: extract_dir.clone(),
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);
    assert_eq!(fs::read(extract_dir.join("a.txt")).unwrap(), b"0123456789");
    assert_eq!(
        fs::read(extract_dir.join("sub/b.txt")).unwrap(),
        b"01234567890123456789"
    );
}

#[test]
fn test_sevenz_plain_roundtrip_and_verify() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_nested_tree(&test_dir).unwrap();
    let source_dir = test_dir.path().join("docs");
    let archive = test_dir.path().join("docs.7z");

    let outcome = run(
        Settings::default(),
        OperationRequest::Compress {
            inputs: vec![source_dir.clone()],
            destination: archive.clone(),
            format: ArchiveFormat::SevenZip,
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    assert!(verify(&archive, &Settings::default()).unwrap());

    let extract_dir = test_dir.path().join("extracted");
    let outcome = run(
        Settings::default(),
        OperationRequest::Decompress {
            source: archive,
            destination: extract_dir.clone(),
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);
    assertions::assert_same_files(&source_dir, &extract_dir.join("docs"));
}

#[test]
fn test_tar_directory_roundtrip() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_nested_tree(&test_dir).unwrap();
    let source_dir = test_dir.path().join("docs");
    let archive = test_dir.path().join("docs.tar");

    let outcome = run(
        Settings::default(),
        OperationRequest::Compress {
            inputs: vec![source_dir.clone()],
            destination: archive.clone(),
            format: ArchiveFormat::Tar,
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    let entries = inspect(&archive, &Settings::default()).unwrap();
    assert!(entries.iter().all(|e| !e.encrypted));

    let extract_dir = test_dir.path().join("extracted");
    let outcome = run(
        Settings::default(),
        OperationRequest::Decompress {
            source: archive,
            destination: extract_dir.clone(),
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);
    assertions::assert_same_files(&source_dir, &extract_dir.join("docs"));
}

#[test]
fn test_xz_single_file_roundtrip() {
    let test_dir = TestDir::new().unwrap();
    let payload = vec![42u8; 300_000];
    let input = test_dir.create_file("data.bin", &payload).unwrap();
    let archive = test_dir.path().join("data.bin.xz");

    let outcome = run(
        Settings::default(),
        OperationRequest::Compress {
            inputs: vec![input],
            destination: archive.clone(),
            format: ArchiveFormat::Xz,
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    let extract_dir = test_dir.path().join("extracted");
    let outcome = run(
        Settings::default(),
        OperationRequest::Decompress {
            source: archive,
            destination: extract_dir.clone(),
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);
    assert_eq!(fs::read(extract_dir.join("data.bin")).unwrap(), payload);
}

#[test]
fn test_xz_rejects_multiple_inputs() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_mixed_inputs(&test_dir).unwrap();
    let archive = test_dir.path().join("both.xz");

    let outcome = run(
        Settings::default(),
        OperationRequest::Compress {
            inputs: vec![test_dir.path().join("a.txt"), test_dir.path().join("sub")],
            destination: archive,
            format: ArchiveFormat::Xz,
        },
    );
    match outcome {
        Outcome::Failed(message) => assert!(message.contains("single file")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_verify_encrypted_archive_requires_password() {
    let test_dir = TestDir::new().unwrap();
    let input = test_dir.create_file("secret.txt", b"classified").unwrap();
    let archive = test_dir.path().join("secret.zip");

    let outcome = run(
        password_settings("hunter2"),
        OperationRequest::Compress {
            inputs: vec![input],
            destination: archive.clone(),
            format: ArchiveFormat::Zip,
        },
    );
    assert_eq!(outcome, Outcome::Succeeded);

    match verify(&archive, &Settings::default()) {
        Err(Error::PasswordRequired) => {}
        other => panic!("expected PasswordRequired, got {:?}", other),
    }
    assert!(verify(&archive, &password_settings("hunter2")).unwrap());
}
