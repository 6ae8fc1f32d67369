//! Per-operation compression settings

use serde::{Deserialize, Serialize};

/// Semantic compression levels, carrying the underlying numeric preset
/// shared by the deflate, LZMA2 and xz backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    None,
    Fastest,
    Fast,
    Normal,
    Maximum,
    Ultra,
}

impl CompressionLevel {
    /// Numeric preset in 0..=9 understood by every compressing backend.
    pub fn preset(&self) -> u32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Normal => 5,
            CompressionLevel::Maximum => 7,
            CompressionLevel::Ultra => 9,
        }
    }

    /// Map the coarse low/normal/high choice exposed by external
    /// collaborators (context menu, shared defaults) onto a level.
    ///
    /// Unknown strings map to Normal; the collaborator store is not
    /// authoritative.
    pub fn from_choice(choice: &str) -> CompressionLevel {
        match choice {
            "low" => CompressionLevel::Fastest,
            "high" => CompressionLevel::Ultra,
            _ => CompressionLevel::Normal,
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Normal
    }
}

impl std::fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompressionLevel::None => "none",
            CompressionLevel::Fastest => "fastest",
            CompressionLevel::Fast => "fast",
            CompressionLevel::Normal => "normal",
            CompressionLevel::Maximum => "maximum",
            CompressionLevel::Ultra => "ultra",
        };
        f.write_str(name)
    }
}

/// Configuration for one archive operation.
///
/// Owned by the caller and snapshotted by the orchestrator when the
/// operation starts; the core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether a password should be applied (compression) or offered
    /// (decompression)
    pub use_password: bool,
    /// The password itself; ignored unless `use_password` is set
    pub password: String,
    /// Compression level for formats that compress
    pub compression_level: CompressionLevel,
    /// Reveal the result in the file manager when the operation succeeds
    pub open_after_completion: bool,
    /// Remove the source files once compression succeeds
    pub delete_source_after_completion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_password: false,
            password: String::new(),
            compression_level: CompressionLevel::Normal,
            open_after_completion: true,
            delete_source_after_completion: false,
        }
    }
}

impl Settings {
    /// The effective password for backends: configured and non-empty.
    pub fn password(&self) -> Option<&str> {
        if self.use_password && !self.password.is_empty() {
            Some(&self.password)
        } else {
            None
        }
    }
}
