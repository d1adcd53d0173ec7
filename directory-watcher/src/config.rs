//! Configuration types for directory watching.

use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Environment variable naming the directory to watch.
pub const WATCH_TARGET_ENV: &str = "WATCH_TARGET_PATH";

/// Default capacity of the raw notification channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Configuration for a watch session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to watch.
    pub root: PathBuf,

    /// Whether subdirectories are watched too.
    pub recursive: bool,

    /// Raw notifications buffered before overflow is reported.
    pub channel_capacity: usize,
}

impl WatchConfig {
    /// Create a recursive config for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Read the root from [`WATCH_TARGET_ENV`].
    pub fn from_env() -> Result<Self> {
        Self::from_target(std::env::var_os(WATCH_TARGET_ENV))
    }

    fn from_target(target: Option<OsString>) -> Result<Self> {
        match target {
            Some(target) if !target.is_empty() => Ok(Self::new(target)),
            _ => Err(WatcherError::Config(format!(
                "path to watch is not specified, set {WATCH_TARGET_ENV}"
            ))),
        }
    }

    /// Watch only the root directory itself.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Set the raw notification channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Reject configs the watcher cannot start from.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(WatcherError::Config("root path is empty".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(WatcherError::Config(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
