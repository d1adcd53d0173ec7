//! Registration of whole directory trees.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, WatcherError};
use crate::registry::WatchRegistry;
use crate::sink::{Milestone, ReportSink};
use crate::source::{NotificationSource, WatchHandle};

/// Walks directory trees and registers every directory found.
#[derive(Clone)]
pub struct TreeRegistrar {
    sink: Arc<dyn ReportSink>,
}

impl TreeRegistrar {
    /// Create a registrar reporting to `sink`.
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self { sink }
    }

    /// Register `root` and every directory below it, depth first.
    ///
    /// Symbolic links are not followed. Walk errors become
    /// [`WatcherError::Traversal`]; registration errors are returned as is.
    /// Returns the number of directories registered.
    pub fn register_tree<S: NotificationSource>(
        &self,
        registry: &mut WatchRegistry<S>,
        root: &Path,
    ) -> Result<usize> {
        self.sink.milestone(&Milestone::ScanStarted {
            root: root.to_path_buf(),
        });

        let mut directories = 0;
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|source| WatcherError::Traversal {
                path: source
                    .path()
                    .map_or_else(|| root.to_path_buf(), Path::to_path_buf),
                source,
            })?;

            if !entry.file_type().is_dir() {
                continue;
            }

            registry.register(entry.path())?;
            directories += 1;
        }

        debug!("Registered {directories} directories under {}", root.display());
        self.sink.milestone(&Milestone::ScanFinished {
            root: root.to_path_buf(),
            directories,
        });

        Ok(directories)
    }

    /// Register `dir` alone, without descending.
    pub fn register_one<S: NotificationSource>(
        &self,
        registry: &mut WatchRegistry<S>,
        dir: &Path,
    ) -> Result<WatchHandle> {
        registry.register(dir)
    }
}
