//! Error types for arca-core

use std::fmt::Display;
use thiserror::Error;

/// Failure classification for archive operations.
///
/// Every backend failure is translated into one of these kinds at the
/// adapter boundary; backend error types never cross into the orchestrator
/// or its observers.
#[derive(Error, Debug)]
pub enum Error {
    /// Backend failed to open the source or destination archive
    #[error("failed to open archive: {0}")]
    Open(String),

    /// Backend failed while writing archive contents
    #[error("failed to write archive: {0}")]
    Write(String),

    /// Backend failed while extracting archive contents
    #[error("failed to extract archive: {0}")]
    Extract(String),

    /// Archive is encrypted and no password was supplied
    #[error("archive is encrypted and requires a password")]
    PasswordRequired,

    /// A password was supplied but rejected by the backend
    #[error("the supplied password was rejected")]
    WrongPassword,

    /// Requested operation is structurally impossible for the format
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Request could not produce any work or targets an unusable destination
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn open(cause: impl Display) -> Self {
        Error::Open(cause.to_string())
    }

    pub fn write(cause: impl Display) -> Self {
        Error::Write(cause.to_string())
    }

    pub fn extract(cause: impl Display) -> Self {
        Error::Extract(cause.to_string())
    }

    pub fn invalid_input(cause: impl Display) -> Self {
        Error::InvalidInput(cause.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
