//! Directory watcher session: startup registration plus the event loop.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::WatchConfig;
use crate::error::Result;
use crate::event_loop::{EventLoop, SessionStats};
use crate::notify_source::NotifySource;
use crate::registrar::TreeRegistrar;
use crate::registry::WatchRegistry;
use crate::sink::ReportSink;
use crate::source::NotificationSource;

/// Watches a directory, and optionally its whole tree, for changes.
pub struct DirectoryWatcher<S = NotifySource> {
    config: WatchConfig,
    registry: WatchRegistry<S>,
    registrar: TreeRegistrar,
    sink: Arc<dyn ReportSink>,
}

impl DirectoryWatcher<NotifySource> {
    /// Create a watcher backed by the platform's notification facility.
    pub fn new(config: WatchConfig, sink: Arc<dyn ReportSink>) -> Result<Self> {
        let source = NotifySource::new(config.channel_capacity)?;
        Self::with_source(config, source, sink)
    }
}

impl<S: NotificationSource> DirectoryWatcher<S> {
    /// Create a watcher over an explicit notification source.
    pub fn with_source(
        mut config: WatchConfig,
        source: S,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self> {
        config.validate()?;
        config.root = std::path::absolute(&config.root)?;
        info!(
            "Creating watcher for {} (recursive: {})",
            config.root.display(),
            config.recursive
        );

        Ok(Self {
            registry: WatchRegistry::new(source, sink.clone()),
            registrar: TreeRegistrar::new(sink.clone()),
            config,
            sink,
        })
    }

    /// Register the root, and its subtree when recursive.
    ///
    /// Any failure here is fatal for the session. Returns the number of
    /// directories registered.
    pub fn init(&mut self) -> Result<usize> {
        let root = self.config.root.clone();
        let registered = if self.config.recursive {
            self.registrar.register_tree(&mut self.registry, &root)?
        } else {
            self.registrar.register_one(&mut self.registry, &root)?;
            1
        };
        self.registry.enable_trace();
        Ok(registered)
    }

    /// The session configuration, with the root made absolute.
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Current watch registrations.
    pub fn registry(&self) -> &WatchRegistry<S> {
        &self.registry
    }

    /// Hand the registrations over to an event loop.
    pub fn into_event_loop(self) -> EventLoop<S> {
        EventLoop::new(
            self.registry,
            self.registrar,
            self.config.recursive,
            self.sink,
        )
    }

    /// Run the event loop until it stops.
    pub async fn run(self, cancel: CancellationToken) -> SessionStats {
        self.into_event_loop().run(cancel).await
    }
}
