//! Command line front end: sources the root path, prints the event stream
//! and maps Ctrl-C onto cancellation.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use treewatch_directory_watcher::config::DEFAULT_CHANNEL_CAPACITY;
use treewatch_directory_watcher::{
    CancellationToken, ChangeEvent, DirectoryWatcher, Milestone, ReportSink, TracingSink,
    WatchConfig,
};

/// Watch a directory tree and print every change.
#[derive(Debug, Parser)]
#[command(name = "treewatch", version, about)]
pub struct Cli {
    /// Directory to watch. Falls back to $WATCH_TARGET_PATH.
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Watch only the directory itself, not its subdirectories.
    #[arg(long)]
    pub no_recursive: bool,

    /// Print events as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Raw notifications buffered before an overflow is reported.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
}

impl Cli {
    /// Build the watch configuration from arguments and environment.
    pub fn watch_config(&self) -> treewatch_directory_watcher::Result<WatchConfig> {
        let config = match &self.path {
            Some(path) => WatchConfig::new(path),
            None => WatchConfig::from_env()?,
        };
        let config = config.with_channel_capacity(self.channel_capacity);
        Ok(if self.no_recursive {
            config.non_recursive()
        } else {
            config
        })
    }
}

/// Prints change events to stdout; milestones go to the log.
#[derive(Debug, Clone, Copy)]
pub struct StdoutSink {
    json: bool,
}

impl StdoutSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn render(&self, event: &ChangeEvent) -> treewatch_directory_watcher::Result<String> {
        if self.json {
            event.to_json_line()
        } else {
            Ok(event.to_string())
        }
    }
}

impl ReportSink for StdoutSink {
    fn report(&self, event: &ChangeEvent) {
        let line = match self.render(event) {
            Ok(line) => line,
            Err(err) => {
                debug!("Failed to render {event}: {err}");
                return;
            }
        };
        if let Err(err) = writeln!(std::io::stdout().lock(), "{line}") {
            debug!("Failed to write event: {err}");
        }
    }

    fn milestone(&self, milestone: &Milestone) {
        TracingSink.milestone(milestone);
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Watch until the watch set is exhausted or Ctrl-C is pressed.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.watch_config()?;
    let root = config.root.clone();

    let sink = Arc::new(StdoutSink::new(cli.json));
    let mut watcher = DirectoryWatcher::new(config, sink)?;
    let registered = watcher
        .init()
        .with_context(|| format!("failed to watch {}", root.display()))?;
    info!("Watching {registered} directories under {}", root.display());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let stats = watcher.run(cancel).await;
    info!(
        "Stopped after {} events ({} overflows, {} directories added, {} dropped)",
        stats.events_reported, stats.overflows, stats.registrations, stats.invalidated
    );
    Ok(())
}
