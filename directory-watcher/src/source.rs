//! The change-notification primitive the watcher consumes.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::RawEvent;

/// Opaque token identifying one registered directory.
///
/// Minted by a [`NotificationSource`]; never constructed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchHandle(u64);

impl WatchHandle {
    /// Wrap a source-assigned identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A per-directory change-notification facility.
///
/// Implementations deliver create, delete and modify notifications for the
/// direct entries of each registered directory, plus an occasional
/// [`RawEvent::Overflow`] when notifications were dropped.
#[async_trait]
pub trait NotificationSource: Send {
    /// Start watching `dir`. Re-registering a watched path may return the
    /// existing handle.
    fn register(&mut self, dir: &Path) -> Result<WatchHandle>;

    /// Wait for the next handle with pending notifications.
    ///
    /// Returns `None` once the source is closed. Must be cancel-safe.
    async fn await_signal(&mut self) -> Option<WatchHandle>;

    /// Drain pending notifications for `handle`, oldest first.
    fn poll_events(&mut self, handle: WatchHandle) -> Vec<RawEvent>;

    /// Re-arm `handle` and report whether it is still valid. An invalid
    /// handle is released by the source.
    fn reset(&mut self, handle: WatchHandle) -> bool;
}
