//! Archive operation orchestration
//!
//! One orchestrator drives one operation at a time from request to a
//! terminal outcome: it resolves the format, selects the codec adapter,
//! expands inputs for compression, applies the password policy for
//! decompression, and forwards adapter progress to the caller.
//!
//! The backend work runs on a background thread; progress and the terminal
//! signal are redelivered to the caller through a channel, so observer
//! callbacks always run on whichever thread drains the handle, never on a
//! backend worker thread.

use std::fs;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::codec::adapter_for;
use crate::expand::expand_entries;
use crate::format::ArchiveFormat;
use crate::progress::{Progress, ProgressSink};
use crate::settings::Settings;
use crate::{Error, Result};

/// A single archive operation to perform.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    /// Compress the given inputs into a new archive of an explicitly
    /// chosen format.
    Compress {
        inputs: Vec<PathBuf>,
        destination: PathBuf,
        format: ArchiveFormat,
    },
    /// Extract an existing archive into a destination directory. The
    /// format is derived from the source extension, never supplied.
    Decompress {
        source: PathBuf,
        destination: PathBuf,
    },
}

/// Pre-terminal phases of one operation. The terminal states are conveyed
/// by [`OperationEvent::Finished`]; a new operation always starts from a
/// fresh handle, terminated ones are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationState {
    Preparing,
    Running,
}

/// Events redelivered to the caller while an operation runs.
///
/// Progress fractions always lie in `[0.0, 1.0]`. When the operation
/// succeeds, the last two events are always `Progress(1.0)` followed by
/// `Finished(Ok(..))`, and the 1.0 sample is delivered exactly once.
#[derive(Debug)]
pub enum OperationEvent {
    Progress(f64),
    Finished(Result<()>),
}

/// Terminal result surfaced to UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    PasswordRequired,
    Failed(String),
}

impl Outcome {
    fn from_result(result: &Result<()>) -> Outcome {
        match result {
            Ok(()) => Outcome::Succeeded,
            Err(Error::PasswordRequired) => Outcome::PasswordRequired,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

/// Observer contract for one operation.
///
/// Callbacks are invoked on the thread that drains the handle (normally
/// the caller's own), never on the backend's worker thread. Exactly one of
/// `on_success` / `on_failure` is invoked, after which no further callbacks
/// occur.
pub trait OperationObserver {
    fn on_progress(&mut self, fraction: f64);
    fn on_success(&mut self);
    fn on_failure(&mut self, error: &Error);
}

/// Handle to an in-flight operation.
pub struct OperationHandle {
    events: Receiver<OperationEvent>,
    worker: Option<JoinHandle<()>>,
}

impl OperationHandle {
    /// The raw event stream, for callers that integrate with their own
    /// event loop instead of blocking.
    pub fn events(&self) -> &Receiver<OperationEvent> {
        &self.events
    }

    /// Drain events on the current thread, forwarding them to the
    /// observer, until the operation reaches a terminal state.
    pub fn wait(mut self, observer: &mut dyn OperationObserver) -> Outcome {
        let mut outcome = Outcome::Failed("operation worker disappeared".to_string());

        while let Ok(event) = self.events.recv() {
            match event {
                OperationEvent::Progress(fraction) => observer.on_progress(fraction),
                OperationEvent::Finished(result) => {
                    outcome = Outcome::from_result(&result);
                    match result {
                        Ok(()) => observer.on_success(),
                        Err(e) => observer.on_failure(&e),
                    }
                    break;
                }
            }
        }

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        outcome
    }
}

/// Sink bridging adapter progress onto the event channel.
///
/// Samples equal to 1.0 are withheld here: the terminal 1.0 is emitted by
/// the worker itself right before success, so it is delivered exactly once
/// even when a backend's own stream reaches (or repeats) 1.0, and still
/// arrives when a backend under-reports its final entry.
struct ChannelSink {
    sender: Sender<OperationEvent>,
}

impl ProgressSink for ChannelSink {
    fn report(&self, progress: Progress) {
        if !progress.is_done() {
            let _ = self
                .sender
                .send(OperationEvent::Progress(progress.fraction()));
        }
    }
}

/// Coordinator for archive operations.
///
/// Holds the settings snapshot for the operations it spawns; the snapshot
/// is cloned into each worker at spawn time, so later mutation by the
/// caller never affects an in-flight operation.
pub struct Orchestrator {
    settings: Settings,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start the operation on a background thread and return a handle to
    /// observe it. The calling thread never blocks on backend I/O.
    pub fn spawn(&self, request: OperationRequest) -> OperationHandle {
        let settings = self.settings.clone();
        let (sender, events) = unbounded();

        let worker = thread::spawn(move || {
            let sink = ChannelSink {
                sender: sender.clone(),
            };
            let result = execute(&request, &settings, &sink);

            match &result {
                Ok(()) => {
                    info!("operation succeeded");
                    let _ = sender.send(OperationEvent::Progress(1.0));
                }
                Err(e) => warn!("operation failed: {}", e),
            }
            let _ = sender.send(OperationEvent::Finished(result));
        });

        OperationHandle {
            events,
            worker: Some(worker),
        }
    }

    /// Convenience wrapper: spawn the operation and drain its events on
    /// the current thread.
    pub fn run(&self, request: OperationRequest, observer: &mut dyn OperationObserver) -> Outcome {
        self.spawn(request).wait(observer)
    }
}

fn execute(request: &OperationRequest, settings: &Settings, sink: &dyn ProgressSink) -> Result<()> {
    let mut state = OperationState::Preparing;
    debug!(?state, "operation accepted");

    match request {
        OperationRequest::Compress {
            inputs,
            destination,
            format,
        } => {
            info!("compress {} inputs -> {:?} ({})", inputs.len(), destination, format);

            if !format.supports_creation() {
                return Err(Error::UnsupportedOperation(format!(
                    "cannot create {} archives",
                    format
                )));
            }

            let staged = expand_entries(inputs);
            if staged.is_empty() {
                return Err(Error::invalid_input(
                    "no files to compress after expanding inputs",
                ));
            }

            if let Some(parent) = destination.parent() {
                if !parent.as_os_str().is_empty() && !parent.is_dir() {
                    return Err(Error::invalid_input(format!(
                        "destination directory does not exist: {:?}",
                        parent
                    )));
                }
            }

            let codec = adapter_for(*format);
            let mut writer = codec.open_for_write(destination, settings)?;

            state = OperationState::Running;
            debug!(?state, "codec adapter opened, {} entries staged", staged.len());

            for entry in &staged {
                writer.add_entry(&entry.source, &entry.name)?;
            }
            writer.finalize(sink)
        }

        OperationRequest::Decompress {
            source,
            destination,
        } => {
            let format = ArchiveFormat::detect(source);
            info!("decompress {:?} -> {:?} ({})", source, destination, format);

            fs::create_dir_all(destination).map_err(Error::invalid_input)?;

            let codec = adapter_for(format);
            let mut reader = codec.open_for_read(source, settings)?;

            // Fail fast before any extraction side effects: an encrypted
            // archive with no usable password never reaches the backend's
            // extract call.
            if reader.is_encrypted()? {
                match settings.password() {
                    Some(password) => reader.set_password(password),
                    None => return Err(Error::PasswordRequired),
                }
            }

            state = OperationState::Running;
            debug!(?state, "codec adapter opened");

            reader.extract_all(destination, sink)
        }
    }
}
