//! RAR codec adapter (extraction only)

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use unrar::error::{Code, UnrarError};
use unrar::Archive;

use crate::codec::{ArchiveEntry, ArchiveReader, ArchiveWriter, Codec};
use crate::format::CodecFamily;
use crate::progress::{Progress, ProgressSink};
use crate::settings::Settings;
use crate::{Error, Result};

/// Adapter for the RAR backend. The format is read-only: creation is
/// structurally unsupported and rejected before reaching this adapter,
/// but the refusal is implemented here as well for direct users.
pub struct RarCodec;

impl Codec for RarCodec {
    fn family(&self) -> CodecFamily {
        CodecFamily::Rar
    }

    fn open_for_write(&self, _dest: &Path, _settings: &Settings) -> Result<Box<dyn ArchiveWriter>> {
        Err(Error::UnsupportedOperation(
            "RAR archives cannot be created".to_string(),
        ))
    }

    fn open_for_read(&self, source: &Path, _settings: &Settings) -> Result<Box<dyn ArchiveReader>> {
        // A password-less listing open distinguishes a readable archive
        // from one with encrypted headers; any other failure is a real
        // open error.
        let header_encrypted = match Archive::new(source).open_for_listing() {
            Ok(_) => false,
            Err(e) if matches!(e.code, Code::MissingPassword) => true,
            Err(e) => return Err(Error::open(format!("{:?}", e.code))),
        };
        debug!(
            "opened RAR archive {:?} (header encrypted: {})",
            source, header_encrypted
        );
        Ok(Box::new(RarReadHandle {
            path: source.to_path_buf(),
            password: None,
            header_encrypted,
            content_encrypted: None,
        }))
    }
}

struct RarReadHandle {
    path: PathBuf,
    password: Option<String>,
    header_encrypted: bool,
    content_encrypted: Option<bool>,
}

impl RarReadHandle {
    fn archive(&self) -> Archive<'_> {
        match &self.password {
            Some(password) => Archive::with_password(self.path.as_path(), password.as_str()),
            None => Archive::new(self.path.as_path()),
        }
    }

    /// Content encryption is not exposed as a header flag by the backend,
    /// so it is detected by reading the first file entry into memory with
    /// no password configured. Nothing touches the destination.
    fn probe_content_encryption(&mut self) -> Result<bool> {
        if let Some(cached) = self.content_encrypted {
            return Ok(cached);
        }

        let mut archive = Archive::new(self.path.as_path())
            .open_for_processing()
            .map_err(|e| Error::open(format!("{:?}", e.code)))?;

        let mut encrypted = false;
        loop {
            let header = match archive.read_header() {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => return Err(Error::open(format!("{:?}", e.code))),
            };

            if header.entry().is_file() {
                match header.read() {
                    Ok(_) => {}
                    Err(e) if matches!(e.code, Code::MissingPassword | Code::BadPassword) => {
                        encrypted = true;
                    }
                    Err(e) => return Err(Error::open(format!("{:?}", e.code))),
                }
                break;
            }

            archive = header
                .skip()
                .map_err(|e| Error::open(format!("{:?}", e.code)))?;
        }

        self.content_encrypted = Some(encrypted);
        Ok(encrypted)
    }

    fn entry_count(&self) -> Result<u64> {
        let archive = self
            .archive()
            .open_for_listing()
            .map_err(map_rar_error)?;
        let mut count = 0u64;
        for entry in archive {
            entry.map_err(map_rar_error)?;
            count += 1;
        }
        Ok(count)
    }
}

impl ArchiveReader for RarReadHandle {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        if self.header_encrypted && self.password.is_none() {
            return Err(Error::PasswordRequired);
        }
        let encrypted = self.is_encrypted()?;

        let archive = self
            .archive()
            .open_for_listing()
            .map_err(map_rar_error)?;

        let mut entries = Vec::new();
        for entry in archive {
            let entry = entry.map_err(map_rar_error)?;
            entries.push(ArchiveEntry {
                path: entry.filename.to_string_lossy().replace('\\', "/"),
                size: entry.unpacked_size as u64,
                is_dir: entry.is_directory(),
                encrypted,
            });
        }

        Ok(entries)
    }

    fn is_encrypted(&mut self) -> Result<bool> {
        if self.header_encrypted {
            return Ok(true);
        }
        self.probe_content_encryption()
    }

    fn set_password(&mut self, password: &str) {
        self.password = Some(password.to_string());
    }

    fn extract_all(&mut self, dest: &Path, sink: &dyn ProgressSink) -> Result<()> {
        fs::create_dir_all(dest).map_err(Error::extract)?;
        let total = self.entry_count()?;

        let mut archive = self
            .archive()
            .open_for_processing()
            .map_err(map_rar_error)?;
        let mut done = 0u64;

        loop {
            let header = match archive.read_header() {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => return Err(map_rar_extract_error(e)),
            };

            debug!("extracting from RAR: {:?}", header.entry().filename);
            archive = if header.entry().is_file() {
                header
                    .extract_with_base(dest)
                    .map_err(map_rar_extract_error)?
            } else {
                header.skip().map_err(map_rar_extract_error)?
            };

            done += 1;
            sink.report(Progress::ratio(done, total));
        }

        Ok(())
    }

    fn test(&mut self) -> Result<bool> {
        let mut archive = self
            .archive()
            .open_for_processing()
            .map_err(map_rar_error)?;

        loop {
            let header = match archive.read_header() {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => {
                    warn!("RAR integrity check failed: {:?}", e.code);
                    return Ok(false);
                }
            };

            archive = if header.entry().is_file() {
                // Reading into memory verifies the entry checksum without
                // writing anything to disk.
                match header.read() {
                    Ok((_, rest)) => rest,
                    Err(e)
                        if matches!(e.code, Code::MissingPassword | Code::BadPassword) =>
                    {
                        return Err(map_rar_extract_error(e));
                    }
                    Err(e) => {
                        warn!("RAR integrity check failed: {:?}", e.code);
                        return Ok(false);
                    }
                }
            } else {
                match header.skip() {
                    Ok(rest) => rest,
                    Err(_) => return Ok(false),
                }
            };
        }

        Ok(true)
    }
}

fn map_rar_error(e: UnrarError) -> Error {
    match e.code {
        Code::MissingPassword => Error::PasswordRequired,
        Code::BadPassword => Error::WrongPassword,
        other => Error::open(format!("{:?}", other)),
    }
}

fn map_rar_extract_error(e: UnrarError) -> Error {
    match e.code {
        Code::MissingPassword => Error::PasswordRequired,
        Code::BadPassword => Error::WrongPassword,
        other => Error::extract(format!("{:?}", other)),
    }
}
