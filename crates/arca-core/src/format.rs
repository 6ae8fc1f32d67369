//! Archive format resolution

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The fixed set of archive formats arca understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    Tar,
    Xz,
    Rar,
}

/// The backend engine class that handles a group of related formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    /// ZIP archives
    Zip,
    /// 7z, tar and xz, handled by the LZMA-family backends
    Lzma,
    /// RAR archives (extraction only)
    Rar,
}

impl ArchiveFormat {
    /// Resolve a file extension to a format.
    ///
    /// Case-insensitive and total: an unrecognized extension resolves to
    /// Zip rather than failing, matching the lenient detection policy of
    /// the desktop integration this library serves.
    pub fn from_extension(ext: &str) -> ArchiveFormat {
        match ext.to_ascii_lowercase().as_str() {
            "zip" => ArchiveFormat::Zip,
            "7z" => ArchiveFormat::SevenZip,
            "tar" => ArchiveFormat::Tar,
            "xz" => ArchiveFormat::Xz,
            "rar" => ArchiveFormat::Rar,
            _ => ArchiveFormat::Zip,
        }
    }

    /// Resolve a format from a path's extension (missing extension → Zip).
    pub fn detect(path: &Path) -> ArchiveFormat {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }

    /// Canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Xz => "xz",
            ArchiveFormat::Rar => "rar",
        }
    }

    /// The codec family that can handle this format.
    pub fn family(&self) -> CodecFamily {
        match self {
            ArchiveFormat::Zip => CodecFamily::Zip,
            ArchiveFormat::SevenZip | ArchiveFormat::Tar | ArchiveFormat::Xz => CodecFamily::Lzma,
            ArchiveFormat::Rar => CodecFamily::Rar,
        }
    }

    /// Whether archives of this format can be created.
    ///
    /// RAR is read-only: extraction works, creation does not.
    pub fn supports_creation(&self) -> bool {
        !matches!(self, ArchiveFormat::Rar)
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    /// Strict parse for user-supplied format names (CLI, dispatch messages).
    ///
    /// Unlike [`ArchiveFormat::from_extension`], an unknown name here is an
    /// error: the user named a format explicitly, so there is nothing to
    /// fall back to.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "7z" | "sevenzip" => Ok(ArchiveFormat::SevenZip),
            "tar" => Ok(ArchiveFormat::Tar),
            "xz" => Ok(ArchiveFormat::Xz),
            "rar" => Ok(ArchiveFormat::Rar),
            other => Err(Error::invalid_input(format!(
                "unknown archive format: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
