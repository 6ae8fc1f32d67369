//! ZIP codec adapter

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{AesMode, CompressionMethod, ZipArchive, ZipWriter};

use crate::codec::{ArchiveEntry, ArchiveReader, ArchiveWriter, Codec};
use crate::format::CodecFamily;
use crate::progress::{Progress, ProgressSink};
use crate::settings::Settings;
use crate::{Error, Result};

/// Adapter for the ZIP backend.
pub struct ZipCodec;

impl Codec for ZipCodec {
    fn family(&self) -> CodecFamily {
        CodecFamily::Zip
    }

    fn open_for_write(&self, dest: &Path, settings: &Settings) -> Result<Box<dyn ArchiveWriter>> {
        let file = File::create(dest).map_err(Error::open)?;
        info!("writing ZIP archive: {:?}", dest);
        Ok(Box::new(ZipWriteHandle {
            writer: Some(ZipWriter::new(file)),
            staged: Vec::new(),
            level: settings.compression_level.preset(),
            password: settings.password().map(str::to_owned),
        }))
    }

    fn open_for_read(&self, source: &Path, _settings: &Settings) -> Result<Box<dyn ArchiveReader>> {
        let file = File::open(source).map_err(Error::open)?;
        let archive = ZipArchive::new(file).map_err(Error::open)?;
        debug!("opened ZIP archive {:?} ({} entries)", source, archive.len());
        Ok(Box::new(ZipReadHandle {
            archive,
            password: None,
        }))
    }
}

struct ZipWriteHandle {
    writer: Option<ZipWriter<File>>,
    staged: Vec<(PathBuf, String)>,
    level: u32,
    password: Option<String>,
}

impl ZipWriteHandle {
    fn entry_options(&self) -> FileOptions<'_, ()> {
        // Level 0 means "store": skip the deflate pass entirely.
        let options: FileOptions<'_, ()> = if self.level == 0 {
            FileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.level as i64))
        };

        match &self.password {
            Some(password) => options.with_aes_encryption(AesMode::Aes256, password),
            None => options,
        }
    }
}

impl ArchiveWriter for ZipWriteHandle {
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
            debug!("adding to ZIP: {:?} as {}", source, name);
            let options = self.entry_options();
            writer.start_file(name.as_str(), options).map_err(Error::write)?;
            let mut input = File::open(source).map_err(Error::write)?;
            io::copy(&mut input, &mut writer).map_err(Error::write)?;
            sink.report(Progress::ratio(done as u64 + 1, total));
        }

        writer.finish().map_err(Error::write)?;
        Ok(())
    }
}

struct ZipReadHandle {
    archive: ZipArchive<File>,
    password: Option<String>,
}

impl ArchiveReader for ZipReadHandle {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let encrypted = self.is_encrypted()?;
        let mut entries = Vec::with_capacity(self.archive.len());

        for i in 0..self.archive.len() {
            // Raw access reads metadata only, so encrypted archives can be
            // listed without a password.
            let file = self.archive.by_index_raw(i).map_err(Error::open)?;
            entries.push(ArchiveEntry {
                path: file.name().replace('\\', "/"),
                size: file.size(),
                is_dir: file.is_dir(),
                encrypted,
            });
        }

        Ok(entries)
    }

    fn is_encrypted(&mut self) -> Result<bool> {
        if self.archive.is_empty() {
            return Ok(false);
        }
        let first = self.archive.by_index_raw(0).map_err(Error::open)?;
        Ok(first.encrypted())
    }

    fn set_password(&mut self, password: &str) {
        self.password = Some(password.to_string());
    }

    fn extract_all(&mut self, dest: &Path, sink: &dyn ProgressSink) -> Result<()> {
        fs::create_dir_all(dest).map_err(Error::extract)?;
        let total = self.archive.len() as u64;

        for i in 0..self.archive.len() {
            let mut file = match &self.password {
                Some(password) => self
                    .archive
                    .by_index_decrypt(i, password.as_bytes())
                    .map_err(map_zip_read_error)?,
                None => self.archive.by_index(i).map_err(map_zip_read_error)?,
            };

            // Entries with escaping paths are dropped rather than extracted
            // outside the destination.
            let relative = match file.enclosed_name() {
                Some(path) => path.to_owned(),
                None => continue,
            };
            let out_path = dest.join(&relative);

            if file.is_dir() {
                fs::create_dir_all(&out_path).map_err(Error::extract)?;
            } else {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent).map_err(Error::extract)?;
                }
                let mut out = File::create(&out_path).map_err(Error::extract)?;
                io::copy(&mut file, &mut out).map_err(Error::extract)?;
            }

            sink.report(Progress::ratio(i as u64 + 1, total));
        }

        Ok(())
    }

    fn test(&mut self) -> Result<bool> {
        for i in 0..self.archive.len() {
            let file = match &self.password {
                Some(password) => self.archive.by_index_decrypt(i, password.as_bytes()),
                None => self.archive.by_index(i),
            };
            let mut file = match file {
                Ok(file) => file,
                Err(ZipError::InvalidPassword) => return Err(Error::WrongPassword),
                Err(e) => {
                    debug!("ZIP integrity check failed opening entry {}: {}", i, e);
                    return Ok(false);
                }
            };
            // Reading to the end drives the backend's checksum validation.
            if io::copy(&mut file, &mut io::sink()).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn map_zip_read_error(e: ZipError) -> Error {
    match e {
        ZipError::InvalidPassword => Error::WrongPassword,
        ZipError::UnsupportedArchive(msg) if msg.contains("Password") => Error::PasswordRequired,
        other => Error::extract(other),
    }
}
