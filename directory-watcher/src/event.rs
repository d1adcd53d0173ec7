//! Change events reported by the watcher.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A raw notification queued on a watch handle.
///
/// The payload is the entry name relative to the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Modified(PathBuf),
    /// The source dropped events for this handle.
    Overflow,
}

impl RawEvent {
    /// The kind this raw event reports as.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Created(_) => ChangeKind::Created,
            Self::Deleted(_) => ChangeKind::Deleted,
            Self::Modified(_) => ChangeKind::Modified,
            Self::Overflow => ChangeKind::Overflow,
        }
    }

    /// Relative entry name, absent for overflow.
    pub fn name(&self) -> Option<&Path> {
        match self {
            Self::Created(name) | Self::Deleted(name) | Self::Modified(name) => {
                Some(name.as_path())
            }
            Self::Overflow => None,
        }
    }
}

/// Kind of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Entry was created.
    Created,

    /// Entry was deleted.
    Deleted,

    /// Entry was modified.
    Modified,

    /// Events were lost.
    Overflow,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "CREATED",
            Self::Deleted => "DELETED",
            Self::Modified => "MODIFIED",
            Self::Overflow => "OVERFLOW",
        };
        f.write_str(label)
    }
}

/// A file system change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The kind of event.
    pub kind: ChangeKind,

    /// Path to the affected entry. For overflow, the watched directory.
    pub path: PathBuf,

    /// Whether the path was a directory when the event was processed.
    pub is_directory: bool,

    /// When the event was processed.
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind,
            path: path.into(),
            is_directory,
            timestamp: Utc::now(),
        }
    }

    /// An overflow report for a watched directory.
    pub fn overflow(dir: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Overflow, dir, true)
    }

    /// Serialize as a single JSON line.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.path.display())?;
        if self.is_directory && self.kind != ChangeKind::Overflow {
            f.write_str(" [DIRECTORY]")?;
        }
        Ok(())
    }
}
