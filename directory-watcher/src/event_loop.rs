//! The long-running consumer of change notifications.

use std::fs;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::WatcherError;
use crate::event::{ChangeEvent, ChangeKind, RawEvent};
use crate::registrar::TreeRegistrar;
use crate::registry::WatchRegistry;
use crate::sink::{Milestone, ReportSink};
use crate::source::{NotificationSource, WatchHandle};

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every watched directory became invalid.
    Exhausted,

    /// The cancellation token fired.
    Interrupted,

    /// The notification source closed.
    SourceClosed,
}

/// Counters for one run of the event loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Signals received from the source.
    pub signals: usize,

    /// Change events reported, overflow included.
    pub events_reported: usize,

    /// Overflow notifications seen.
    pub overflows: usize,

    /// Directories registered while running.
    pub registrations: usize,

    /// New subtrees left unwatched after a registration failure.
    pub skipped_subtrees: usize,

    /// Signals whose handle was not recognized.
    pub stale_signals: usize,

    /// Handles dropped as invalid.
    pub invalidated: usize,

    /// Set once the loop returns.
    pub stop_reason: Option<StopReason>,
}

/// Drains notifications, reports changes and keeps the watch set current.
pub struct EventLoop<S> {
    registry: WatchRegistry<S>,
    registrar: TreeRegistrar,
    recursive: bool,
    sink: Arc<dyn ReportSink>,
    stats: SessionStats,
}

impl<S: NotificationSource> EventLoop<S> {
    /// Create a loop over an already populated registry.
    pub fn new(
        registry: WatchRegistry<S>,
        registrar: TreeRegistrar,
        recursive: bool,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            registry,
            registrar,
            recursive,
            sink,
            stats: SessionStats::default(),
        }
    }

    /// The registry as the loop currently sees it.
    pub fn registry(&self) -> &WatchRegistry<S> {
        &self.registry
    }

    /// Process notifications until the watch set is empty, the source
    /// closes or `cancel` fires.
    ///
    /// Failures while handling a single event never end the loop.
    pub async fn run(&mut self, cancel: CancellationToken) -> SessionStats {
        info!("Entering event loop with {} watches", self.registry.len());

        let reason = if self.registry.is_empty() {
            self.sink.milestone(&Milestone::WatchSetExhausted);
            StopReason::Exhausted
        } else {
            self.drive(&cancel).await
        };

        info!("Event loop stopped: {reason:?}");
        self.stats.stop_reason = Some(reason);
        self.stats.clone()
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> StopReason {
        loop {
            let signaled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.sink.milestone(&Milestone::Interrupted);
                    return StopReason::Interrupted;
                }
                signaled = self.registry.source_mut().await_signal() => signaled,
            };

            let Some(handle) = signaled else {
                self.sink.milestone(&Milestone::SourceClosed);
                return StopReason::SourceClosed;
            };

            if self.dispatch(handle).is_break() {
                return StopReason::Exhausted;
            }
        }
    }

    /// Handle one signal: drain its events, then reset the handle.
    fn dispatch(&mut self, handle: WatchHandle) -> ControlFlow<()> {
        self.stats.signals += 1;

        let Some(dir) = self.registry.resolve(handle).map(Path::to_path_buf) else {
            self.stats.stale_signals += 1;
            self.sink.milestone(&Milestone::StaleSignal { handle });
            return ControlFlow::Continue(());
        };

        for raw in self.registry.source_mut().poll_events(handle) {
            self.process(&dir, raw);
        }

        if !self.registry.source_mut().reset(handle) {
            if let Some(path) = self.registry.invalidate(handle) {
                self.stats.invalidated += 1;
                self.sink.milestone(&Milestone::Invalidated { path });
            }
            if self.registry.is_empty() {
                self.sink.milestone(&Milestone::WatchSetExhausted);
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn process(&mut self, dir: &Path, raw: RawEvent) {
        let kind = raw.kind();
        let Some(name) = raw.name() else {
            self.stats.overflows += 1;
            self.report(&ChangeEvent::overflow(dir));
            return;
        };

        let path = dir.join(name);
        // Deleted entries cannot be stat'ed and count as plain entries.
        let is_directory = fs::symlink_metadata(&path).is_ok_and(|meta| meta.is_dir());
        let event = ChangeEvent::new(kind, path, is_directory);
        self.report(&event);

        if self.recursive && kind == ChangeKind::Created && is_directory {
            match self.registrar.register_tree(&mut self.registry, &event.path) {
                Ok(count) => self.stats.registrations += count,
                Err(err) => self.skip_subtree(&event.path, err),
            }
        }
    }

    /// A new subtree that cannot be registered is left unwatched. The
    /// directory may already be gone again, so this never stops the loop.
    fn skip_subtree(&mut self, path: &Path, err: WatcherError) {
        debug!(
            "Registration of new subtree {} failed (registration error: {})",
            path.display(),
            err.is_registration()
        );
        self.stats.skipped_subtrees += 1;
        self.sink.milestone(&Milestone::SubtreeSkipped {
            path: path.to_path_buf(),
            reason: err.to_string(),
        });
    }

    fn report(&mut self, event: &ChangeEvent) {
        self.stats.events_reported += 1;
        self.sink.report(event);
    }
}
