//! Process-shared default settings
//!
//! Two keys are shared with the desktop-integration collaborator process
//! so both sides agree on default compression settings between
//! invocations. The store is external input, not authoritative
//! configuration: it is validated and defaulted on every read.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::settings::CompressionLevel;
use crate::{Error, Result};

/// The coarse level choice exposed by the collaborator menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelChoice {
    Low,
    Normal,
    High,
}

impl LevelChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelChoice::Low => "low",
            LevelChoice::Normal => "normal",
            LevelChoice::High => "high",
        }
    }

    pub fn to_level(self) -> CompressionLevel {
        CompressionLevel::from_choice(self.as_str())
    }
}

/// The shared key-value contract: exactly two keys, stable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedDefaults {
    pub compression_level: LevelChoice,
    pub use_password: bool,
}

impl Default for SharedDefaults {
    fn default() -> Self {
        Self {
            compression_level: LevelChoice::Normal,
            use_password: false,
        }
    }
}

/// On-disk shape. Kept separate from [`SharedDefaults`] so unknown or
/// missing values degrade to defaults instead of failing the read.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDefaults {
    #[serde(rename = "CompressionLevel")]
    compression_level: Option<String>,
    #[serde(rename = "UsePassword")]
    use_password: Option<bool>,
}

impl SharedDefaults {
    /// Path of the shared store under the user configuration directory.
    pub fn store_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::invalid_input("unable to determine config directory"))?;
        Ok(config_dir.join("arca").join("defaults.toml"))
    }

    /// Read the shared store, falling back to defaults for anything
    /// missing, malformed or out of range.
    pub fn load() -> SharedDefaults {
        match Self::store_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => SharedDefaults::default(),
        }
    }

    pub fn load_from(path: &Path) -> SharedDefaults {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return SharedDefaults::default(),
        };

        let stored: StoredDefaults = match toml::from_str(&contents) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("shared defaults store is malformed, using defaults: {}", e);
                return SharedDefaults::default();
            }
        };

        let compression_level = match stored.compression_level.as_deref() {
            Some("low") => LevelChoice::Low,
            Some("high") => LevelChoice::High,
            Some("normal") | None => LevelChoice::Normal,
            Some(other) => {
                warn!("unknown compression level {:?} in shared store, using normal", other);
                LevelChoice::Normal
            }
        };

        SharedDefaults {
            compression_level,
            use_password: stored.use_password.unwrap_or(false),
        }
    }

    /// Persist the two keys for the collaborator process to pick up.
    pub fn save(&self) -> Result<()> {
        let path = Self::store_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::invalid_input)?;
        }
        let stored = StoredDefaults {
            compression_level: Some(self.compression_level.as_str().to_string()),
            use_password: Some(self.use_password),
        };
        let contents = toml::to_string_pretty(&stored).map_err(Error::invalid_input)?;
        fs::write(path, contents).map_err(Error::invalid_input)?;
        Ok(())
    }
}
