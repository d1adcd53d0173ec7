//! Bookkeeping of watch handles and the directories they watch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, WatcherError};
use crate::sink::{Milestone, ReportSink};
use crate::source::{NotificationSource, WatchHandle};

/// Maps live watch handles to the directories they were registered for.
///
/// Every handle held here was successfully registered with the source and
/// has not been invalidated since.
pub struct WatchRegistry<S> {
    source: S,
    paths: HashMap<WatchHandle, PathBuf>,
    sink: Arc<dyn ReportSink>,
    trace: bool,
}

impl<S: NotificationSource> WatchRegistry<S> {
    /// Create an empty registry over `source`.
    pub fn new(source: S, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            source,
            paths: HashMap::new(),
            sink,
            trace: false,
        }
    }

    /// Report registrations from now on.
    pub fn enable_trace(&mut self) {
        self.trace = true;
    }

    /// Register `dir` with the source and record its handle.
    pub fn register(&mut self, dir: &Path) -> Result<WatchHandle> {
        let metadata = std::fs::metadata(dir).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                WatcherError::DirectoryNotFound(dir.display().to_string())
            }
            std::io::ErrorKind::PermissionDenied => {
                WatcherError::PermissionDenied(dir.display().to_string())
            }
            _ => WatcherError::Io(err),
        })?;
        if !metadata.is_dir() {
            return Err(WatcherError::NotADirectory(dir.display().to_string()));
        }

        let handle = self.source.register(dir)?;
        let previous = self.paths.insert(handle, dir.to_path_buf());

        if self.trace {
            match previous {
                None => self.sink.milestone(&Milestone::Registered {
                    path: dir.to_path_buf(),
                }),
                Some(previous) if previous != dir => {
                    self.sink.milestone(&Milestone::Reregistered {
                        previous,
                        path: dir.to_path_buf(),
                    });
                }
                Some(_) => {}
            }
        } else {
            debug!("Registered {} as {handle}", dir.display());
        }

        Ok(handle)
    }

    /// Look up the directory watched by `handle`.
    pub fn resolve(&self, handle: WatchHandle) -> Option<&Path> {
        self.paths.get(&handle).map(PathBuf::as_path)
    }

    /// Forget `handle`, returning the path it watched if it was present.
    pub fn invalidate(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        self.paths.remove(&handle)
    }

    /// Find the handle watching `path`.
    pub fn find(&self, path: &Path) -> Option<WatchHandle> {
        self.paths
            .iter()
            .find(|(_, watched)| watched.as_path() == path)
            .map(|(handle, _)| *handle)
    }

    /// Iterate over watched directories.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.values().map(PathBuf::as_path)
    }

    /// Whether no watches remain.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of live watches.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// The underlying notification source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::TracingSink;
    use crate::testing::{RecordingSink, ScriptedSource};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn registry() -> WatchRegistry<ScriptedSource> {
        WatchRegistry::new(ScriptedSource::new(), Arc::new(TracingSink))
    }

    #[test]
    fn test_register_and_resolve() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry();

        let handle = registry.register(temp_dir.path()).unwrap();
        assert_eq!(registry.resolve(handle), Some(temp_dir.path()));
        assert_eq!(registry.find(temp_dir.path()), Some(handle));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry();

        let result = registry.register(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(WatcherError::DirectoryNotFound(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();
        let mut registry = registry();

        let result = registry.register(&file);
        assert!(matches!(result, Err(WatcherError::NotADirectory(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry();

        let first = registry.register(temp_dir.path()).unwrap();
        let second = registry.register(temp_dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalidate_twice() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry();
        let handle = registry.register(temp_dir.path()).unwrap();

        assert_eq!(registry.invalidate(handle), Some(temp_dir.path().to_path_buf()));
        assert_eq!(registry.invalidate(handle), None);
        assert!(registry.is_empty());
        assert_eq!(registry.resolve(handle), None);
    }

    #[test]
    fn test_trace_reports_new_registrations() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let mut registry = WatchRegistry::new(ScriptedSource::new(), sink.clone());

        registry.register(temp_dir.path()).unwrap();
        assert!(sink.milestones().is_empty());

        registry.enable_trace();
        registry.register(temp_dir.path()).unwrap();
        registry.register(&sub).unwrap();
        assert_eq!(
            sink.milestones(),
            vec![Milestone::Registered { path: sub.clone() }]
        );
    }

    #[test]
    fn test_trace_reports_moved_registration() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("old");
        let new = temp_dir.path().join("new");
        std::fs::create_dir(&old).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let source = ScriptedSource::new().rename(&old, &new);
        let mut registry = WatchRegistry::new(source, sink.clone());

        let handle = registry.register(&old).unwrap();
        std::fs::rename(&old, &new).unwrap();
        registry.enable_trace();

        assert_eq!(registry.register(&new).unwrap(), handle);
        assert_eq!(registry.resolve(handle), Some(new.as_path()));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            sink.milestones(),
            vec![Milestone::Reregistered {
                previous: old,
                path: new,
            }]
        );
    }
}
