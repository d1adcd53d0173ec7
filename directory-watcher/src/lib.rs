//! # Directory Watcher
//!
//! Recursive file system monitoring that keeps its watch set current as
//! directories come and go.
//!
//! ## Features
//!
//! - **Tree Registration**: Every directory under the root is watched
//! - **Incremental Extension**: New subdirectories are picked up while running
//! - **Stale Watch Pruning**: Deleted directories drop out of the watch set
//! - **Overflow Reporting**: Lost notifications are reported, not fatal
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchConfig ──► TreeRegistrar ──► WatchRegistry               │
//! │                        ▲                 │                      │
//! │                        │                 ▼                      │
//! │  NotificationSource ──► EventLoop ──► ReportSink               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod notify_source;
pub mod registrar;
pub mod registry;
pub mod sink;
pub mod source;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{WATCH_TARGET_ENV, WatchConfig};
pub use error::{Result, WatcherError};
pub use event::{ChangeEvent, ChangeKind, RawEvent};
pub use event_loop::{EventLoop, SessionStats, StopReason};
pub use notify_source::NotifySource;
pub use registrar::TreeRegistrar;
pub use registry::WatchRegistry;
pub use sink::{ChannelSink, Milestone, ReportSink, TracingSink};
pub use source::{NotificationSource, WatchHandle};
pub use tokio_util::sync::CancellationToken;
pub use watcher::DirectoryWatcher;
