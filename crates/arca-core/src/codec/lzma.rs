//! LZMA-family codec adapter: 7z, tar and xz

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sevenz_rust::{
    AesEncoderOptions, MethodOptions, Password, SevenZArchiveEntry, SevenZMethod,
    SevenZMethodConfiguration, SevenZReader, SevenZWriter,
};
use sevenz_rust::lzma::LZMA2Options;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::codec::{ArchiveEntry, ArchiveReader, ArchiveWriter, Codec};
use crate::format::{ArchiveFormat, CodecFamily};
use crate::progress::{Progress, ProgressSink};
use crate::settings::Settings;
use crate::{Error, Result};

const COPY_CHUNK: usize = 64 * 1024;

/// Adapter for the LZMA-family backends.
///
/// One adapter instance serves one of the three container variants; the
/// variant is fixed at selection time so the orchestrator never branches
/// on it again.
pub struct LzmaCodec {
    format: ArchiveFormat,
}

impl LzmaCodec {
    pub fn new(format: ArchiveFormat) -> Self {
        debug_assert!(matches!(
            format,
            ArchiveFormat::SevenZip | ArchiveFormat::Tar | ArchiveFormat::Xz
        ));
        Self { format }
    }
}

impl Codec for LzmaCodec {
    fn family(&self) -> CodecFamily {
        CodecFamily::Lzma
    }

    fn open_for_write(&self, dest: &Path, settings: &Settings) -> Result<Box<dyn ArchiveWriter>> {
        info!("writing {} archive: {:?}", self.format, dest);
        match self.format {
            ArchiveFormat::SevenZip => {
                let mut writer = SevenZWriter::create(dest).map_err(Error::open)?;
                let mut methods = Vec::new();
                if let Some(password) = settings.password() {
                    // Password always means full encryption: content and
                    // header together, never header-only.
                    methods.push(AesEncoderOptions::new(Password::from(password)).into());
                    writer.set_encrypt_header(true);
                }
                methods.push(
                    SevenZMethodConfiguration::new(SevenZMethod::LZMA2).with_options(
                        MethodOptions::LZMA2(LZMA2Options::with_preset(
                            settings.compression_level.preset(),
                        )),
                    ),
                );
                writer.set_content_methods(methods);
                Ok(Box::new(SevenZWriteHandle {
                    writer: Some(writer),
                    staged: Vec::new(),
                }))
            }
            ArchiveFormat::Tar => {
                if settings.password().is_some() {
                    warn!("tar archives cannot be encrypted; ignoring configured password");
                }
                let file = File::create(dest).map_err(Error::open)?;
                Ok(Box::new(TarWriteHandle {
                    builder: Some(tar::Builder::new(file)),
                    staged: Vec::new(),
                }))
            }
            ArchiveFormat::Xz => {
                if settings.password().is_some() {
                    warn!("xz streams cannot be encrypted; ignoring configured password");
                }
                let file = File::create(dest).map_err(Error::open)?;
                Ok(Box::new(XzWriteHandle {
                    encoder: Some(XzEncoder::new(file, settings.compression_level.preset())),
                    staged: Vec::new(),
                }))
            }
            _ => Err(Error::UnsupportedOperation(format!(
                "{} is not an LZMA-family format",
                self.format
            ))),
        }
    }

    fn open_for_read(&self, source: &Path, _settings: &Settings) -> Result<Box<dyn ArchiveReader>> {
        match self.format {
            ArchiveFormat::SevenZip => {
                // Probe the header eagerly so missing or corrupt archives
                // fail at open rather than on first use. Archives with
                // encrypted headers refuse the password-less open; that is
                // itself the encryption signal, not an open failure.
                let header_encrypted = match SevenZReader::open(source, Password::empty()) {
                    Ok(_) => false,
                    Err(sevenz_rust::Error::PasswordRequired) => true,
                    Err(e) => return Err(Error::open(e)),
                };
                Ok(Box::new(SevenZReadHandle {
                    path: source.to_path_buf(),
                    password: None,
                    header_encrypted,
                    content_encrypted: None,
                }))
            }
            ArchiveFormat::Tar => {
                // Validate the header before handing out a handle.
                let file = File::open(source).map_err(Error::open)?;
                let mut probe = tar::Archive::new(file);
                probe.entries().map_err(Error::open)?;
                Ok(Box::new(TarReadHandle {
                    path: source.to_path_buf(),
                }))
            }
            ArchiveFormat::Xz => {
                File::open(source).map_err(Error::open)?;
                Ok(Box::new(XzReadHandle {
                    path: source.to_path_buf(),
                }))
            }
            _ => Err(Error::UnsupportedOperation(format!(
                "{} is not an LZMA-family format",
                self.format
            ))),
        }
    }
}

// --- 7z ---

struct SevenZWriteHandle {
    writer: Option<SevenZWriter<File>>,
    staged: Vec<(PathBuf, String)>,
}

impl ArchiveWriter for SevenZWriteHandle {
    fn add_entry(&mut self, source: &Path, name: &str) -> Result<()> {
        self.staged.push((source.to_path_buf(), name.to_string()));
        Ok(())
    }

    fn finalize(&mut self, sink: &dyn ProgressSink) -> Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| Error::write("archive already finalized"))?;
        let total = self.staged.len() as u64;

        for (done, (source, name)) in self.staged.iter().enumerate() {
            debug!("adding to 7z: {:?} as {}", source, name);
            let entry = SevenZArchiveEntry::from_path(source, name.clone());
            let file = File::open(source).map_err(Error::write)?;
            writer
                .push_archive_entry(entry, Some(file))
                .map_err(Error::write)?;
            sink.report(Progress::ratio(done as u64 + 1, total));
        }

        writer.finish().map_err(Error::write)?;
        Ok(())
    }
}

struct SevenZReadHandle {
    path: PathBuf,
    password: Option<String>,
    header_encrypted: bool,
    content_encrypted: Option<bool>,
}

impl SevenZReadHandle {
    fn open(&self) -> Result<SevenZReader<File>> {
        let password = match &self.password {
            Some(password) => Password::from(password.as_str()),
            None => Password::empty(),
        };
        SevenZReader::open(&self.path, password).map_err(map_sevenz_error)
    }

    /// Entry metadata carries no encryption flag in this backend, so
    /// encrypted content is detected by reading one byte of the first file
    /// entry without a password and watching for the backend's password
    /// errors. Bounded and purely in-memory.
    fn probe_content_encryption(&mut self) -> Result<bool> {
        if let Some(cached) = self.content_encrypted {
            return Ok(cached);
        }

        let mut reader =
            SevenZReader::open(&self.path, Password::empty()).map_err(map_sevenz_error)?;
        let result = reader.for_each_entries(|entry, rd| {
            if entry.is_directory() {
                return Ok(true);
            }
            let mut byte = [0u8; 1];
            rd.read(&mut byte).map_err(sevenz_rust::Error::io)?;
            Ok(false)
        });

        let encrypted = match result {
            Ok(_) => false,
            Err(sevenz_rust::Error::PasswordRequired)
            | Err(sevenz_rust::Error::MaybeBadPassword(_)) => true,
            Err(e) => return Err(Error::open(e)),
        };
        self.content_encrypted = Some(encrypted);
        Ok(encrypted)
    }
}

impl ArchiveReader for SevenZReadHandle {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        if self.header_encrypted && self.password.is_none() {
            return Err(Error::PasswordRequired);
        }
        let encrypted = self.is_encrypted()?;
        let reader = self.open()?;

        Ok(reader
            .archive()
            .files
            .iter()
            .map(|entry| ArchiveEntry {
                path: entry.name().replace('\\', "/"),
                size: entry.size(),
                is_dir: entry.is_directory(),
                encrypted,
            })
            .collect())
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
        let mut reader = self.open()?;
        let total = reader.archive().files.len() as u64;
        let mut done = 0u64;

        reader
            .for_each_entries(|entry, rd| {
                let out_path = match safe_join(dest, entry.name()) {
                    Some(path) => path,
                    None => {
                        warn!("skipping entry escaping destination: {}", entry.name());
                        return Ok(true);
                    }
                };

                if entry.is_directory() {
                    fs::create_dir_all(&out_path).map_err(sevenz_rust::Error::io)?;
                } else {
                    if let Some(parent) = out_path.parent() {
                        fs::create_dir_all(parent).map_err(sevenz_rust::Error::io)?;
                    }
                    let mut out = File::create(&out_path).map_err(sevenz_rust::Error::io)?;
                    io::copy(rd, &mut out).map_err(sevenz_rust::Error::io)?;
                }

                done += 1;
                sink.report(Progress::ratio(done, total));
                Ok(true)
            })
            .map_err(|e| match e {
                sevenz_rust::Error::PasswordRequired => Error::PasswordRequired,
                sevenz_rust::Error::MaybeBadPassword(_) => Error::WrongPassword,
                other => Error::extract(other),
            })?;

        Ok(())
    }

    fn test(&mut self) -> Result<bool> {
        let mut reader = self.open()?;
        let result = reader.for_each_entries(|_entry, rd| {
            io::copy(rd, &mut io::sink()).map_err(sevenz_rust::Error::io)?;
            Ok(true)
        });

        match result {
            Ok(_) => Ok(true),
            Err(sevenz_rust::Error::PasswordRequired) => Err(Error::PasswordRequired),
            Err(sevenz_rust::Error::MaybeBadPassword(_)) => Err(Error::WrongPassword),
            Err(e) => {
                debug!("7z integrity check failed: {}", e);
                Ok(false)
            }
        }
    }
}

fn map_sevenz_error(e: sevenz_rust::Error) -> Error {
    match e {
        sevenz_rust::Error::PasswordRequired => Error::PasswordRequired,
        sevenz_rust::Error::MaybeBadPassword(_) => Error::WrongPassword,
        other => Error::open(other),
    }
}

// --- tar ---

struct TarWriteHandle {
    builder: Option<tar::Builder<File>>,
    staged: Vec<(PathBuf, String)>,
}

impl ArchiveWriter for TarWriteHandle {
    fn add_entry(&mut self, source: &Path, name: &str) -> Result<()> {
        self.staged.push((source.to_path_buf(), name.to_string()));
        Ok(())
    }

    fn finalize(&mut self, sink: &dyn ProgressSink) -> Result<()> {
        let builder = self
            .builder
            .as_mut()
            .ok_or_else(|| Error::write("archive already finalized"))?;
        let total = self.staged.len() as u64;

        for (done, (source, name)) in self.staged.iter().enumerate() {
            debug!("adding to tar: {:?} as {}", source, name);
            builder
                .append_path_with_name(source, name)
                .map_err(Error::write)?;
            sink.report(Progress::ratio(done as u64 + 1, total));
        }

        builder.finish().map_err(Error::write)?;
        self.builder = None;
        Ok(())
    }
}

struct TarReadHandle {
    path: PathBuf,
}

impl TarReadHandle {
    fn open(&self) -> Result<tar::Archive<File>> {
        let file = File::open(&self.path).map_err(Error::open)?;
        Ok(tar::Archive::new(file))
    }
}

impl ArchiveReader for TarReadHandle {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut archive = self.open()?;
        let mut entries = Vec::new();

        for entry in archive.entries().map_err(Error::open)? {
            let entry = entry.map_err(Error::open)?;
            let path = entry.path().map_err(Error::open)?.into_owned();
            entries.push(ArchiveEntry {
                path: path.to_string_lossy().replace('\\', "/"),
                size: entry.size(),
                is_dir: entry.header().entry_type().is_dir(),
                encrypted: false,
            });
        }

        Ok(entries)
    }

    fn is_encrypted(&mut self) -> Result<bool> {
        // The tar format has no notion of encryption.
        Ok(false)
    }

    fn set_password(&mut self, _password: &str) {}

    fn extract_all(&mut self, dest: &Path, sink: &dyn ProgressSink) -> Result<()> {
        fs::create_dir_all(dest).map_err(Error::extract)?;

        // The format stores no entry count, so count in a first pass to
        // normalize progress.
        let mut archive = self.open()?;
        let total = archive.entries().map_err(Error::extract)?.count() as u64;

        let mut archive = self.open()?;
        let mut done = 0u64;
        for entry in archive.entries().map_err(Error::extract)? {
            let mut entry = entry.map_err(Error::extract)?;
            entry.unpack_in(dest).map_err(Error::extract)?;
            done += 1;
            sink.report(Progress::ratio(done, total));
        }

        Ok(())
    }

    fn test(&mut self) -> Result<bool> {
        let mut archive = match self.open() {
            Ok(archive) => archive,
            Err(_) => return Ok(false),
        };
        let entries = match archive.entries() {
            Ok(entries) => entries,
            Err(_) => return Ok(false),
        };
        for entry in entries {
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(_) => return Ok(false),
            };
            if io::copy(&mut entry, &mut io::sink()).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// --- xz ---

struct XzWriteHandle {
    encoder: Option<XzEncoder<File>>,
    staged: Vec<PathBuf>,
}

impl ArchiveWriter for XzWriteHandle {
    fn add_entry(&mut self, source: &Path, _name: &str) -> Result<()> {
        if !self.staged.is_empty() {
            return Err(Error::invalid_input(
                "xz compresses a single file; use 7z or tar for multiple inputs",
            ));
        }
        self.staged.push(source.to_path_buf());
        Ok(())
    }

    fn finalize(&mut self, sink: &dyn ProgressSink) -> Result<()> {
        let mut encoder = self
            .encoder
            .take()
            .ok_or_else(|| Error::write("archive already finalized"))?;
        let source = self
            .staged
            .first()
            .ok_or_else(|| Error::invalid_input("no input file for xz stream"))?;

        let total = fs::metadata(source).map_err(Error::write)?.len();
        let mut input = File::open(source).map_err(Error::write)?;
        let mut consumed = 0u64;
        let mut buf = [0u8; COPY_CHUNK];

        loop {
            let n = input.read(&mut buf).map_err(Error::write)?;
            if n == 0 {
                break;
            }
            encoder.write_all(&buf[..n]).map_err(Error::write)?;
            consumed += n as u64;
            sink.report(Progress::ratio(consumed, total));
        }

        encoder.finish().map_err(Error::write)?;
        Ok(())
    }
}

struct XzReadHandle {
    path: PathBuf,
}

impl XzReadHandle {
    /// An xz stream holds exactly one unnamed payload; the extracted file
    /// is named by the archive stem.
    fn payload_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "extracted".to_string())
    }
}

impl ArchiveReader for XzReadHandle {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        // Uncompressed size is not recorded in the stream header; reported
        // as zero rather than decoded ahead of time.
        Ok(vec![ArchiveEntry {
            path: self.payload_name(),
            size: 0,
            is_dir: false,
            encrypted: false,
        }])
    }

    fn is_encrypted(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn set_password(&mut self, _password: &str) {}

    fn extract_all(&mut self, dest: &Path, sink: &dyn ProgressSink) -> Result<()> {
        fs::create_dir_all(dest).map_err(Error::extract)?;

        let total = fs::metadata(&self.path).map_err(Error::open)?.len();
        let file = File::open(&self.path).map_err(Error::open)?;
        let consumed = Arc::new(AtomicU64::new(0));
        let mut decoder = XzDecoder::new(CountingReader {
            inner: file,
            count: Arc::clone(&consumed),
        });

        let out_path = dest.join(self.payload_name());
        let mut out = File::create(&out_path).map_err(Error::extract)?;
        let mut buf = [0u8; COPY_CHUNK];

        loop {
            let n = decoder.read(&mut buf).map_err(Error::extract)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).map_err(Error::extract)?;
            sink.report(Progress::ratio(consumed.load(Ordering::Relaxed), total));
        }

        Ok(())
    }

    fn test(&mut self) -> Result<bool> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return Ok(false),
        };
        let mut decoder = XzDecoder::new(file);
        Ok(io::copy(&mut decoder, &mut io::sink()).is_ok())
    }
}

/// Reader wrapper counting compressed bytes consumed, for byte-based
/// progress on single-stream formats.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Join an archive entry name below `dest`, rejecting absolute paths and
/// parent-directory components.
fn safe_join(dest: &Path, name: &str) -> Option<PathBuf> {
    let relative = PathBuf::from(name.replace('\\', "/"));
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return None,
        }
    }
    Some(dest.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullSink;
    use tempfile::TempDir;

    #[test]
    fn test_tar_roundtrip_preserves_contents() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("notes.txt");
        fs::write(&source, b"tar roundtrip").unwrap();
        let dest = temp.path().join("notes.tar");

        let codec = LzmaCodec::new(ArchiveFormat::Tar);
        let mut writer = codec.open_for_write(&dest, &Settings::default()).unwrap();
        writer.add_entry(&source, "notes.txt").unwrap();
        writer.finalize(&NullSink).unwrap();

        let out = temp.path().join("out");
        let mut reader = codec.open_for_read(&dest, &Settings::default()).unwrap();
        assert!(!reader.is_encrypted().unwrap());
        reader.extract_all(&out, &NullSink).unwrap();

        assert_eq!(fs::read(out.join("notes.txt")).unwrap(), b"tar roundtrip");
    }

    #[test]
    fn test_xz_rejects_multiple_inputs() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let dest = temp.path().join("a.txt.xz");

        let codec = LzmaCodec::new(ArchiveFormat::Xz);
        let mut writer = codec.open_for_write(&dest, &Settings::default()).unwrap();
        writer.add_entry(&a, "a.txt").unwrap();
        let err = writer.add_entry(&b, "b.txt").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_xz_roundtrip_names_payload_by_stem() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("data.bin");
        fs::write(&source, vec![7u8; 200_000]).unwrap();
        let dest = temp.path().join("data.bin.xz");

        let codec = LzmaCodec::new(ArchiveFormat::Xz);
        let mut writer = codec.open_for_write(&dest, &Settings::default()).unwrap();
        writer.add_entry(&source, "data.bin").unwrap();
        writer.finalize(&NullSink).unwrap();

        let out = temp.path().join("out");
        let mut reader = codec.open_for_read(&dest, &Settings::default()).unwrap();
        reader.extract_all(&out, &NullSink).unwrap();
        assert_eq!(
            fs::read(out.join("data.bin")).unwrap(),
            vec![7u8; 200_000]
        );
        assert!(reader.test().unwrap());
    }

    #[test]
    fn test_safe_join_rejects_escapes() {
        let dest = Path::new("/tmp/out");
        assert!(safe_join(dest, "ok/inner.txt").is_some());
        assert!(safe_join(dest, "../escape.txt").is_none());
        assert!(safe_join(dest, "/absolute.txt").is_none());
    }
}
