//! Integration tests for the operation lifecycle and progress contract

use std::path::PathBuf;

use arca_core::{
    ArchiveFormat, Error, OperationEvent, OperationObserver, OperationRequest, Orchestrator,
    Outcome, Settings,
};
use arca_testing::{assertions, fixtures, TestDir};

/// Observer that records everything it is told.
#[derive(Default)]
struct RecordingObserver {
    samples: Vec<f64>,
    succeeded: bool,
    failure: Option<String>,
}

impl OperationObserver for RecordingObserver {
    fn on_progress(&mut self, fraction: f64) {
        self.samples.push(fraction);
    }

    fn on_success(&mut self) {
        self.succeeded = true;
    }

    fn on_failure(&mut self, error: &Error) {
        self.failure = Some(error.to_string());
    }
}

#[test]
fn test_compress_to_rar_is_rejected_before_any_io() {
    let test_dir = TestDir::new().unwrap();
    let input = test_dir.create_file("a.txt", b"contents").unwrap();
    let destination = test_dir.path().join("out.rar");

    let orchestrator = Orchestrator::new(Settings::default());
    let mut observer = RecordingObserver::default();
    let outcome = orchestrator.run(
        OperationRequest::Compress {
            inputs: vec![input],
            destination: destination.clone(),
            format: ArchiveFormat::Rar,
        },
        &mut observer,
    );

    match outcome {
        Outcome::Failed(message) => assert!(message.contains("unsupported operation")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!destination.exists(), "no destination file may be created");
    assert!(observer.samples.is_empty());
    assert!(!observer.succeeded);
    assert!(observer.failure.is_some());
}

#[test]
fn test_compress_with_no_usable_inputs_fails() {
    let test_dir = TestDir::new().unwrap();
    let destination = test_dir.path().join("out.zip");

    let orchestrator = Orchestrator::new(Settings::default());
    let mut observer = RecordingObserver::default();
    let outcome = orchestrator.run(
        OperationRequest::Compress {
            inputs: vec![PathBuf::from("/definitely/not/here.txt")],
            destination: destination.clone(),
            format: ArchiveFormat::Zip,
        },
        &mut observer,
    );

    match outcome {
        Outcome::Failed(message) => assert!(message.contains("invalid input")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!destination.exists());
}

#[test]
fn test_progress_contract_on_success() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_mixed_inputs(&test_dir).unwrap();
    let destination = test_dir.path().join("out.zip");

    let orchestrator = Orchestrator::new(Settings::default());
    let mut observer = RecordingObserver::default();
    let outcome = orchestrator.run(
        OperationRequest::Compress {
            inputs: vec![test_dir.path().join("a.txt"), test_dir.path().join("sub")],
            destination,
            format: ArchiveFormat::Zip,
        },
        &mut observer,
    );

    assert_eq!(outcome, Outcome::Succeeded);
    assert!(observer.succeeded);
    assert!(observer.failure.is_none());

    assert!(!observer.samples.is_empty());
    for sample in &observer.samples {
        assert!((0.0..=1.0).contains(sample), "sample out of range: {sample}");
    }

    // The terminal 1.0 arrives exactly once, as the last sample, right
    // before the success signal.
    let terminal_count = observer.samples.iter().filter(|s| **s >= 1.0).count();
    assert_eq!(terminal_count, 1);
    assert_eq!(*observer.samples.last().unwrap(), 1.0);
}

#[test]
fn test_event_stream_ends_with_finished() {
    let test_dir = TestDir::new().unwrap();
    let input = test_dir.create_file("a.txt", b"event stream").unwrap();

    let orchestrator = Orchestrator::new(Settings::default());
    let handle = orchestrator.spawn(OperationRequest::Compress {
        inputs: vec![input],
        destination: test_dir.path().join("out.tar"),
        format: ArchiveFormat::Tar,
    });

    let mut events = Vec::new();
    while let Ok(event) = handle.events().recv() {
        let terminal = matches!(event, OperationEvent::Finished(_));
        events.push(event);
        if terminal {
            break;
        }
    }

    match events.last() {
        Some(OperationEvent::Finished(Ok(()))) => {}
        other => panic!("expected a successful Finished event, got {:?}", other),
    }
    // Every earlier event is a progress sample.
    for event in &events[..events.len() - 1] {
        assert!(matches!(event, OperationEvent::Progress(_)));
    }
}

#[test]
fn test_encrypted_archive_without_password_fails_fast() {
    let test_dir = TestDir::new().unwrap();
    let input = test_dir.create_file("secret.txt", b"classified").unwrap();
    let archive = test_dir.path().join("secret.zip");

    let encrypting = Orchestrator::new(Settings {
        use_password: true,
        password: "hunter2".to_string(),
        ..Settings::default()
    });
    let mut observer = RecordingObserver::default();
    let outcome = encrypting.run(
        OperationRequest::Compress {
            inputs: vec![input],
            destination: archive.clone(),
            format: ArchiveFormat::Zip,
        },
        &mut observer,
    );
    assert_eq!(outcome, Outcome::Succeeded);

    // Decompressing with no password configured fails before extraction
    // writes anything.
    let extract_dir = test_dir.path().join("extracted");
    let orchestrator = Orchestrator::new(Settings::default());
    let mut observer = RecordingObserver::default();
    let outcome = orchestrator.run(
        OperationRequest::Decompress {
            source: archive,
            destination: extract_dir.clone(),
        },
        &mut observer,
    );

    assert_eq!(outcome, Outcome::PasswordRequired);
    assert!(!observer.succeeded);
    assertions::assert_dir_empty(&extract_dir);
}

#[test]
fn test_decompress_missing_archive_fails_with_open_error() {
    let test_dir = TestDir::new().unwrap();

    let orchestrator = Orchestrator::new(Settings::default());
    let mut observer = RecordingObserver::default();
    let outcome = orchestrator.run(
        OperationRequest::Decompress {
            source: test_dir.path().join("missing.zip"),
            destination: test_dir.path().join("out"),
        },
        &mut observer,
    );

    match outcome {
        Outcome::Failed(message) => assert!(message.contains("failed to open")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}
