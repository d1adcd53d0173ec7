//! Report sinks receiving change events and watch milestones.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::ChangeEvent;
use crate::source::WatchHandle;

/// Progress notices emitted alongside change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Milestone {
    /// A tree walk began.
    ScanStarted { root: PathBuf },

    /// A tree walk finished.
    ScanFinished { root: PathBuf, directories: usize },

    /// A directory was newly registered after startup.
    Registered { path: PathBuf },

    /// A handle was re-registered under a different path.
    Reregistered { previous: PathBuf, path: PathBuf },

    /// A newly created subtree could not be registered and stays unwatched.
    SubtreeSkipped { path: PathBuf, reason: String },

    /// A signaled handle did not resolve to a watched path.
    StaleSignal { handle: WatchHandle },

    /// A watched directory became invalid and was dropped.
    Invalidated { path: PathBuf },

    /// No watched directories remain.
    WatchSetExhausted,

    /// The wait was cancelled.
    Interrupted,

    /// The notification source closed.
    SourceClosed,
}

/// Receives what the watcher observes.
pub trait ReportSink: Send + Sync {
    /// A change was observed.
    fn report(&self, event: &ChangeEvent);

    /// A watch milestone was reached.
    fn milestone(&self, milestone: &Milestone);
}

/// Logs everything through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, event: &ChangeEvent) {
        info!("{event}");
    }

    fn milestone(&self, milestone: &Milestone) {
        match milestone {
            Milestone::ScanStarted { root } => info!("Scanning {} ...", root.display()),
            Milestone::ScanFinished { root, directories } => {
                info!("Done scanning {}: {directories} directories", root.display());
            }
            Milestone::Registered { path } => info!("Watching {}", path.display()),
            Milestone::Reregistered { previous, path } => {
                info!("Watching {} -> {}", previous.display(), path.display());
            }
            Milestone::SubtreeSkipped { path, reason } => {
                warn!("Leaving {} unwatched: {reason}", path.display());
            }
            Milestone::StaleSignal { handle } => debug!("Watch handle {handle} not recognized"),
            Milestone::Invalidated { path } => debug!("Dropped watch for {}", path.display()),
            Milestone::WatchSetExhausted => info!("Watch set is empty, nothing to watch"),
            Milestone::Interrupted => info!("Watch interrupted"),
            Milestone::SourceClosed => warn!("Notification source closed"),
        }
    }
}

/// Forwards change events to a channel; milestones are logged.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    event_tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { event_tx }, event_rx)
    }
}

impl ReportSink for ChannelSink {
    fn report(&self, event: &ChangeEvent) {
        if self.event_tx.send(event.clone()).is_err() {
            debug!("Event receiver dropped, discarding {event}");
        }
    }

    fn milestone(&self, milestone: &Milestone) {
        TracingSink.milestone(milestone);
    }
}
