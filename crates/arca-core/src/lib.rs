//! arca - archive orchestration core
//!
//! This library coordinates compression and extraction across three codec
//! families (ZIP; 7z/tar/xz; RAR) behind one capability surface, with
//! unified progress reporting and a small, stable failure taxonomy.

pub mod codec;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod expand;
pub mod format;
pub mod orchestrator;
pub mod progress;
pub mod settings;
pub mod tree;

pub use error::{Error, Result};

// Re-export commonly used types
pub use codec::{adapter_for, inspect, summarize, verify, ArchiveEntry, ArchiveSummary};
pub use defaults::{LevelChoice, SharedDefaults};
pub use dispatch::RemoteRequest;
pub use format::{ArchiveFormat, CodecFamily};
pub use orchestrator::{
    OperationEvent, OperationHandle, OperationObserver, OperationRequest, Orchestrator, Outcome,
};
pub use progress::{Progress, ProgressSink};
pub use settings::{CompressionLevel, Settings};
pub use tree::{build_tree, ArchiveItem};
