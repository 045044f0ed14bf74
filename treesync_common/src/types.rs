use crate::TreeSyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// Criterion used to decide whether two files with the same name are equal.
///
/// Sizes are always compared first whatever the level; the level decides what
/// happens once sizes match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EqualityLevel {
    /// Equal sizes mean equal files
    Size,
    /// Equal sizes and modification times mean equal files; a timestamp
    /// mismatch falls back to comparing content
    LastModified,
    /// Equal sizes and byte-for-byte identical content
    #[default]
    Content,
}

impl EqualityLevel {
    pub const ALL: [EqualityLevel; 3] = [Self::Size, Self::LastModified, Self::Content];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "SIZE",
            Self::LastModified => "LAST_MODIFIED",
            Self::Content => "CONTENT",
        }
    }
}

impl fmt::Display for EqualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EqualityLevel {
    type Err = TreeSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| {
                TreeSyncError::InvalidArgument(format!(
                    "unknown level '{}', expected one of SIZE, LAST_MODIFIED, CONTENT",
                    s
                ))
            })
    }
}

/// Size and modification time of a path, read on demand for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// `None` when the size could not be read
    pub size: Option<u64>,
    /// `None` when the modification time could not be read
    pub modified: Option<SystemTime>,
}

impl FileInfo {
    /// Reads metadata for `path`, following symbolic links. Never fails; fields
    /// that cannot be read are left empty.
    pub fn read(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) => Self {
                size: Some(meta.len()),
                modified: meta.modified().ok(),
            },
            Err(_) => Self::default(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Equality level used when none is given on the command line
    #[serde(default)]
    pub level: EqualityLevel,

    /// Align the second file's modification time when contents match
    #[serde(default)]
    pub fix_last_modified: bool,

    /// Paths relative to both roots that are never compared
    #[serde(default)]
    pub exclusions: Vec<PathBuf>,

    /// Print comparing lines and file details
    #[serde(default)]
    pub verbose: bool,

    /// Send deleted entries to the platform trash instead of removing them
    #[serde(default)]
    pub use_trash: bool,
}
