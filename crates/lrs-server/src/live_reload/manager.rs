//! Live reload manager.
//!
//! Wires the file watcher, debouncer and broadcaster together: the watcher
//! feeds a bounded queue, a tokio task debounces it and every emitted signal
//! is broadcast to the connected clients.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lrs_config::Configuration;
use lrs_watch::{ChangeStream, ChangeWatcher, ExtensionFilter, WatchError, run_debouncer};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::broadcaster::ReloadBroadcaster;
use super::registry::ClientRegistry;

/// Manages file watching and broadcasting reload events.
pub(crate) struct LiveReloadManager {
    web_root: PathBuf,
    filter: ExtensionFilter,
    debounce: Duration,
    registry: Arc<ClientRegistry>,
    watcher: Option<ChangeWatcher>,
    task: Option<JoinHandle<()>>,
    shutdown: watch::Receiver<bool>,
}

impl LiveReloadManager {
    /// Create a manager for the configured web root.
    ///
    /// Flipping `shutdown` to `true` stops the debouncer and discards any
    /// pending signal.
    pub(crate) fn new(config: &Configuration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            web_root: config.web_root.clone(),
            filter: ExtensionFilter::new(&config.watched_extensions),
            debounce: config.debounce,
            registry: Arc::new(ClientRegistry::new()),
            watcher: None,
            task: None,
            shutdown,
        }
    }

    /// Registry of connected clients.
    pub(crate) fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    /// Start watching the web root.
    ///
    /// # Errors
    ///
    /// Returns an error if the web root cannot be watched.
    pub(crate) fn start(&mut self) -> Result<(), WatchError> {
        let mut watcher = ChangeWatcher::new(self.web_root.clone(), self.filter.clone());
        let stream = watcher.start()?;
        self.watcher = Some(watcher);
        self.start_with_stream(stream);

        tracing::info!(root = %self.web_root.display(), "Live reload watching");
        Ok(())
    }

    /// Spawn the debounce and broadcast task over an existing change stream.
    pub(crate) fn start_with_stream(&mut self, stream: ChangeStream) {
        let broadcaster = ReloadBroadcaster::new(self.registry());

        self.task = Some(tokio::spawn(run_debouncer(
            stream,
            self.debounce,
            self.shutdown.clone(),
            move |signal| {
                let report = broadcaster.broadcast(&signal);
                tracing::info!(
                    scope = ?signal.scope,
                    files = signal.paths.len(),
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "Live reload event processed"
                );
            },
        )));
    }

    /// Stop watching and disconnect every client.
    ///
    /// The shutdown flag should already be set so the debouncer does not
    /// flush a pending signal.
    pub(crate) async fn stop(mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::warn!(error = %err, "Live reload task failed");
        }
        let closed = self.registry.close_all();
        tracing::debug!(clients = closed, "Live reload stopped");
    }
}
