//! Error types for the directory watcher.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the directory watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// No usable root path.
    #[error("configuration error: {0}")]
    Config(String),

    /// The tree walk could not proceed.
    #[error("cannot traverse {}: {source}", .path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Watch limit exceeded.
    #[error("watch limit exceeded while registering {0}")]
    WatchLimitExceeded(String),

    /// The notification source rejected the directory.
    #[error("cannot register {}: {source}", .path.display())]
    Registration {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WatcherError {
    /// Classify a failed `notify` watch request for `path`.
    pub fn registration(path: &Path, source: notify::Error) -> Self {
        let display = path.display().to_string();
        match &source.kind {
            notify::ErrorKind::MaxFilesWatch => Self::WatchLimitExceeded(display),
            notify::ErrorKind::PathNotFound => Self::DirectoryNotFound(display),
            notify::ErrorKind::Io(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(display)
            }
            notify::ErrorKind::Io(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::DirectoryNotFound(display)
            }
            _ => Self::Registration {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether this error means a single directory could not be registered.
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::DirectoryNotFound(_)
                | Self::NotADirectory(_)
                | Self::PermissionDenied(_)
                | Self::WatchLimitExceeded(_)
                | Self::Registration { .. }
        )
    }
}
