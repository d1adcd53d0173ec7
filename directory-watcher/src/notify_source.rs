//! Notification source backed by the `notify` crate.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

use crate::error::{Result, WatcherError};
use crate::event::{ChangeKind, RawEvent};
use crate::source::{NotificationSource, WatchHandle};

type RawResult = notify::Result<notify::Event>;

/// Watches each registered directory non-recursively through the
/// platform's recommended `notify` backend.
///
/// Events arrive on notify's own thread and are buffered in a bounded
/// channel. When the buffer is full they are dropped and an overflow is
/// reported on the oldest live handle.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    raw_rx: mpsc::Receiver<RawResult>,
    overflowed: Arc<AtomicBool>,
    by_path: HashMap<PathBuf, WatchHandle>,
    by_handle: BTreeMap<WatchHandle, PathBuf>,
    pending: HashMap<WatchHandle, VecDeque<RawEvent>>,
    signaled: VecDeque<WatchHandle>,
    /// Watched directories whose deletion was already routed.
    deleted: HashSet<PathBuf>,
    /// Released directories whose deletion was not routed yet.
    retired: HashSet<PathBuf>,
    next_handle: u64,
}

impl NotifySource {
    /// Create a source buffering up to `capacity` raw notifications.
    pub fn new(capacity: usize) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel(capacity.max(1));
        let overflowed = Arc::new(AtomicBool::new(false));

        let flag = overflowed.clone();
        let watcher = notify::recommended_watcher(move |res: RawResult| {
            match raw_tx.try_send(res) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => flag.store(true, Ordering::Release),
                Err(TrySendError::Closed(_)) => {}
            }
        })?;

        Ok(Self {
            watcher,
            raw_rx,
            overflowed,
            by_path: HashMap::new(),
            by_handle: BTreeMap::new(),
            pending: HashMap::new(),
            signaled: VecDeque::new(),
            deleted: HashSet::new(),
            retired: HashSet::new(),
            next_handle: 0,
        })
    }

    fn oldest(&self) -> Option<WatchHandle> {
        self.by_handle.keys().next().copied()
    }

    fn signal(&mut self, handle: WatchHandle) {
        if !self.signaled.contains(&handle) {
            self.signaled.push_back(handle);
        }
    }

    fn enqueue(&mut self, handle: WatchHandle, event: RawEvent) {
        let queue = self.pending.entry(handle).or_default();
        // Repeats of the last queued event are folded into it.
        if queue.back() == Some(&event) {
            return;
        }
        queue.push_back(event);
        self.signal(handle);
    }

    fn route(&mut self, res: RawResult) {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                warn!("Watch error: {err}");
                return;
            }
        };

        if event.need_rescan() {
            let handle = event
                .paths
                .first()
                .and_then(|path| path.parent())
                .and_then(|parent| self.by_path.get(parent).copied())
                .or_else(|| self.oldest());
            if let Some(handle) = handle {
                self.enqueue(handle, RawEvent::Overflow);
            }
            return;
        }

        for (kind, path) in classify(&event) {
            self.route_path(kind, path);
        }
    }

    fn route_path(&mut self, kind: ChangeKind, path: &Path) {
        match kind {
            ChangeKind::Deleted => {
                // Parent and self both announce the deletion, the latter
                // possibly after the handle was released.
                if self.deleted.contains(path) {
                    return;
                }
                let own = self.by_path.get(path).copied();
                if own.is_some() || self.retired.remove(path) {
                    self.deleted.insert(path.to_path_buf());
                }
                if let Some(own) = own {
                    self.signal(own);
                }
            }
            ChangeKind::Created => {
                self.deleted.remove(path);
            }
            ChangeKind::Modified | ChangeKind::Overflow => {}
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let Some(&handle) = self.by_path.get(parent) else {
            trace!("No watch covers {}", path.display());
            return;
        };

        let name = PathBuf::from(name);
        let raw = match kind {
            ChangeKind::Created => RawEvent::Created(name),
            ChangeKind::Deleted => RawEvent::Deleted(name),
            ChangeKind::Modified | ChangeKind::Overflow => RawEvent::Modified(name),
        };
        self.enqueue(handle, raw);
    }
}

/// Map a notify event onto the kinds the watcher reports.
fn classify(event: &notify::Event) -> Vec<(ChangeKind, &Path)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        // The halves of the rename were already delivered.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .map(|path| {
                    let kind = if path.symlink_metadata().is_ok() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Deleted
                    };
                    (kind, path.as_path())
                })
                .collect();
        }
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|path| (kind, path.as_path()))
        .collect()
}

#[async_trait]
impl NotificationSource for NotifySource {
    fn register(&mut self, dir: &Path) -> Result<WatchHandle> {
        // Watching an already watched path re-arms it.
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|err| WatcherError::registration(dir, err))?;

        self.deleted.remove(dir);
        self.retired.remove(dir);
        if let Some(&handle) = self.by_path.get(dir) {
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
            while let Ok(res) = self.raw_rx.try_recv() {
                self.route(res);
            }

            if self.overflowed.swap(false, Ordering::AcqRel) {
                if let Some(handle) = self.oldest() {
                    self.enqueue(handle, RawEvent::Overflow);
                }
            }

            if let Some(handle) = self.signaled.pop_front() {
                return Some(handle);
            }

            let res = self.raw_rx.recv().await?;
            self.route(res);
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

        if valid {
            if self.pending.get(&handle).is_some_and(|queue| !queue.is_empty()) {
                self.signal(handle);
            }
        } else {
            self.pending.remove(&handle);
            self.signaled.retain(|signaled| *signaled != handle);
            if let Some(dir) = self.by_handle.remove(&handle) {
                self.by_path.remove(&dir);
                // The backend usually dropped the watch with the directory.
                let _ = self.watcher.unwatch(&dir);
                if !self.deleted.contains(&dir) {
                    self.retired.insert(dir);
                }
            }
        }

        valid
    }
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource")
            .field("watches", &self.by_handle.len())
            .field("signaled", &self.signaled.len())
            .finish()
    }
}
