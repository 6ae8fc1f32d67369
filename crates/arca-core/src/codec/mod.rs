//! Codec adapters: one shared capability surface over three backends

pub mod lzma;
pub mod rar;
pub mod zip;

use std::path::Path;

use serde::Serialize;

use crate::format::{ArchiveFormat, CodecFamily};
use crate::progress::ProgressSink;
use crate::settings::Settings;
use crate::{Error, Result};

/// One logical file or directory record inside an archive.
///
/// Entries are addressed by their position in the sequence returned by
/// [`ArchiveReader::entries`]; positions are stable only while the reader
/// stays open. Encryption is archive-wide in every supported backend, so
/// `encrypted` carries the same value on every entry of one archive.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEntry {
    /// Path within the archive, `/`-separated
    pub path: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Whether this entry is a directory
    pub is_dir: bool,
    /// Whether the archive's contents are encrypted
    pub encrypted: bool,
}

/// Aggregate view of an archive produced from one listing pass.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub item_count: usize,
    pub total_size: u64,
    pub encrypted: bool,
}

/// An archive opened for writing.
///
/// Entries are staged with [`add_entry`](ArchiveWriter::add_entry) and
/// committed by [`finalize`](ArchiveWriter::finalize), which performs the
/// actual compression and emits progress. Nothing is guaranteed to be on
/// disk until `finalize` returns.
pub trait ArchiveWriter: Send {
    /// Stage one regular file under the given archive-relative name.
    fn add_entry(&mut self, source: &Path, name: &str) -> Result<()>;

    /// Compress all staged entries and commit the archive.
    fn finalize(&mut self, sink: &dyn ProgressSink) -> Result<()>;
}

/// An archive opened for reading.
pub trait ArchiveReader: Send {
    /// Enumerate all entries without extracting.
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>>;

    /// Whether the archive is encrypted, decided before any password is
    /// supplied. Encryption is archive-wide in all supported backends, so
    /// inspecting the first entry is sufficient.
    fn is_encrypted(&mut self) -> Result<bool>;

    /// Record the password to use for subsequent reads. Validation may be
    /// deferred until the backend actually decrypts content.
    fn set_password(&mut self, password: &str);

    /// Extract every entry below `dest`, emitting progress samples.
    fn extract_all(&mut self, dest: &Path, sink: &dyn ProgressSink) -> Result<()>;

    /// Integrity-check the archive without writing anything to disk.
    fn test(&mut self) -> Result<bool>;
}

/// A codec family normalized behind the shared capability surface.
pub trait Codec: Send + Sync {
    fn family(&self) -> CodecFamily;

    fn open_for_write(&self, dest: &Path, settings: &Settings) -> Result<Box<dyn ArchiveWriter>>;

    fn open_for_read(&self, source: &Path, settings: &Settings) -> Result<Box<dyn ArchiveReader>>;
}

/// Select the adapter that can handle the given format.
pub fn adapter_for(format: ArchiveFormat) -> Box<dyn Codec> {
    match format.family() {
        CodecFamily::Zip => Box::new(zip::ZipCodec),
        CodecFamily::Lzma => Box::new(lzma::LzmaCodec::new(format)),
        CodecFamily::Rar => Box::new(rar::RarCodec),
    }
}

/// List the entries of an existing archive, resolving the format from the
/// file extension.
pub fn inspect(source: &Path, settings: &Settings) -> Result<Vec<ArchiveEntry>> {
    let format = ArchiveFormat::detect(source);
    let codec = adapter_for(format);
    let mut reader = codec.open_for_read(source, settings)?;
    if let Some(password) = settings.password() {
        reader.set_password(password);
    }
    reader.entries()
}

/// Aggregate an archive's listing into a summary.
pub fn summarize(source: &Path, settings: &Settings) -> Result<ArchiveSummary> {
    let entries = inspect(source, settings)?;
    Ok(ArchiveSummary {
        item_count: entries.len(),
        total_size: entries.iter().map(|e| e.size).sum(),
        encrypted: entries.first().map(|e| e.encrypted).unwrap_or(false),
    })
}

/// Integrity-check an archive without extracting it.
///
/// Applies the same password policy as decompression: an encrypted archive
/// with no configured password fails with [`Error::PasswordRequired`]
/// before the backend reads any content.
pub fn verify(source: &Path, settings: &Settings) -> Result<bool> {
    let format = ArchiveFormat::detect(source);
    let codec = adapter_for(format);
    let mut reader = codec.open_for_read(source, settings)?;

    if reader.is_encrypted()? {
        match settings.password() {
            Some(password) => reader.set_password(password),
            None => return Err(Error::PasswordRequired),
        }
    }

    reader.test()
}
