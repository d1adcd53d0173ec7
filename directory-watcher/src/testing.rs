//! Test doubles for driving the watcher deterministically.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, WatcherError};
use crate::event::{ChangeEvent, RawEvent};
use crate::sink::{Milestone, ReportSink};
use crate::source::{NotificationSource, WatchHandle};

/// A handle no scripted source ever hands out.
pub(crate) const UNKNOWN_HANDLE: WatchHandle = WatchHandle::new(u64::MAX);

type Action = Box<dyn FnOnce() + Send>;

enum Step {
    Signal { dir: PathBuf, events: Vec<RawEvent> },
    Stale(WatchHandle),
    Act(Action),
    Close,
}

/// Replays a fixed script of signals against real directories.
///
/// Validity is the directory's current existence on disk. Once the script
/// runs out, `await_signal` never resolves.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    script: VecDeque<Step>,
    by_path: HashMap<PathBuf, WatchHandle>,
    by_handle: HashMap<WatchHandle, PathBuf>,
    pending: HashMap<WatchHandle, VecDeque<RawEvent>>,
    refused: HashSet<PathBuf>,
    renamed: HashMap<PathBuf, PathBuf>,
    next_handle: u64,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Signal the handle registered for `dir` with `events`.
    pub(crate) fn signal(mut self, dir: impl Into<PathBuf>, events: Vec<RawEvent>) -> Self {
        self.script.push_back(Step::Signal {
            dir: dir.into(),
            events,
        });
        self
    }

    /// Signal a handle directly.
    pub(crate) fn stale(mut self, handle: WatchHandle) -> Self {
        self.script.push_back(Step::Stale(handle));
        self
    }

    /// Run `action` when the script reaches this point.
    pub(crate) fn act(mut self, action: impl FnOnce() + Send + 'static) -> Self {
        self.script.push_back(Step::Act(Box::new(action)));
        self
    }

    /// Close the source.
    pub(crate) fn close(mut self) -> Self {
        self.script.push_back(Step::Close);
        self
    }

    /// Reject registration of `dir`.
    pub(crate) fn refuse(mut self, dir: impl Into<PathBuf>) -> Self {
        self.refused.insert(dir.into());
        self
    }

    /// Hand out the handle of `from` when `to` is registered, the way a
    /// per-inode watch follows a renamed directory.
    pub(crate) fn rename(mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        self.renamed.insert(to.into(), from.into());
        self
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    fn register(&mut self, dir: &Path) -> Result<WatchHandle> {
        if self.refused.contains(dir) {
            return Err(WatcherError::PermissionDenied(dir.display().to_string()));
        }
        if let Some(handle) = self.by_path.get(dir) {
            return Ok(*handle);
        }
        if let Some(handle) = self.renamed.get(dir).and_then(|from| self.by_path.remove(from)) {
            self.by_path.insert(dir.to_path_buf(), handle);
            self.by_handle.insert(handle, dir.to_path_buf());
            return Ok(handle);
        }
        let handle = WatchHandle::new(self.next_handle);
        self.next_handle += 1;
        self.by_path.insert(dir.to_path_buf(), handle);
        self.by_handle.insert(handle, dir.to_path_buf());
        Ok(handle)
    }

    async fn await_signal(&mut self) -> Option<WatchHandle> {
        loop {
            match self.script.pop_front() {
                Some(Step::Signal { dir, events }) => {
                    let handle = self.by_path.get(&dir).copied().unwrap_or(UNKNOWN_HANDLE);
                    self.pending.entry(handle).or_default().extend(events);
                    return Some(handle);
                }
                Some(Step::Stale(handle)) => return Some(handle),
                Some(Step::Act(action)) => action(),
                Some(Step::Close) => return None,
                None => std::future::pending::<()>().await,
            }
        }
    }

    fn poll_events(&mut self, handle: WatchHandle) -> Vec<RawEvent> {
        self.pending
            .remove(&handle)
            .map(Vec::from)
            .unwrap_or_default()
    }

    fn reset(&mut self, handle: WatchHandle) -> bool {
        let valid = self.by_handle.get(&handle).is_some_and(|dir| dir.is_dir());
        if !valid {
            if let Some(dir) = self.by_handle.remove(&handle) {
                self.by_path.remove(&dir);
            }
        }
        valid
    }
}

/// Collects everything reported to it.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
    milestones: Mutex<Vec<Milestone>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn milestones(&self) -> Vec<Milestone> {
        self.milestones.lock().unwrap().clone()
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, event: &ChangeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn milestone(&self, milestone: &Milestone) {
        self.milestones.lock().unwrap().push(milestone.clone());
    }
}
