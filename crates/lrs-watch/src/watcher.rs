//! Recursive directory watching.
//!
//! [`ChangeWatcher`] wraps a `notify` watcher. The notify callback runs on its
//! own thread and feeds a bounded channel; the async side reads it through a
//! [`ChangeStream`]. Duplicate events are passed through untouched, the
//! debouncer collapses them.

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::event::{ChangeEvent, ChangeKind, ExtensionFilter};

/// Capacity of the watcher-to-consumer queue.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Watcher error.
///
/// Errors delivered through a [`ChangeStream`] are recoverable: the stream
/// stays open after reporting them.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The root directory cannot be watched.
    #[error("Watch root {} is not accessible: {source}", path.display())]
    RootUnavailable {
        /// Root directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The root directory was removed or renamed while watched.
    #[error("Watch root {} was removed or renamed", .0.display())]
    RootRemoved(PathBuf),
    /// Error from the OS watch backend.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Item produced by a [`ChangeStream`].
#[derive(Debug)]
pub enum WatchItem {
    /// A filtered change.
    Change(ChangeEvent),
    /// A recoverable watcher error.
    Error(WatchError),
}

/// Receiving side of a watch.
///
/// Ends (yields `None`) once the producing watcher is stopped.
#[derive(Debug)]
pub struct ChangeStream {
    rx: mpsc::Receiver<WatchItem>,
}

impl ChangeStream {
    /// Create a stream fed by the returned sender.
    ///
    /// Lets callers drive the debouncer from a source other than the
    /// filesystem.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<WatchItem>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Wait for the next item.
    pub async fn recv(&mut self) -> Option<WatchItem> {
        self.rx.recv().await
    }
}

/// Recursive watcher over a root directory.
pub struct ChangeWatcher {
    root: PathBuf,
    filter: ExtensionFilter,
    watcher: Option<RecommendedWatcher>,
}

impl ChangeWatcher {
    /// Create a watcher for `root`. Nothing is watched until [`start`](Self::start).
    #[must_use]
    pub fn new(root: PathBuf, filter: ExtensionFilter) -> Self {
        Self {
            root,
            filter,
            watcher: None,
        }
    }

    /// Whether OS watch handles are currently held.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching and return the event stream.
    ///
    /// Calling `start` again restarts the watch; the previous stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not an accessible directory or the
    /// OS watcher cannot be created.
    pub fn start(&mut self) -> Result<ChangeStream, WatchError> {
        self.stop();

        let metadata = std::fs::metadata(&self.root).map_err(|source| {
            WatchError::RootUnavailable {
                path: self.root.clone(),
                source,
            }
        })?;
        if !metadata.is_dir() {
            return Err(WatchError::RootUnavailable {
                path: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "not a directory",
                ),
            });
        }

        let (tx, stream) = ChangeStream::channel(EVENT_QUEUE_CAPACITY);
        let root = self.root.clone();
        let filter = self.filter.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            for item in translate(res, &root, &filter) {
                // Use blocking_send since callback is sync
                if tx.blocking_send(item).is_err() {
                    return;
                }
            }
        })?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        tracing::debug!(root = %self.root.display(), "Started file watcher");
        Ok(stream)
    }

    /// Stop watching and release OS watch handles.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            tracing::debug!(root = %self.root.display(), "Stopped file watcher");
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Convert a raw notify result into stream items.
fn translate(
    res: Result<Event, notify::Error>,
    root: &Path,
    filter: &ExtensionFilter,
) -> Vec<WatchItem> {
    let event = match res {
        Ok(event) => event,
        Err(err) => return vec![WatchItem::Error(WatchError::Notify(err))],
    };

    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return Vec::new(),
    };

    let mut items = Vec::new();
    for path in event.paths {
        if path == root {
            if matches!(kind, ChangeKind::Removed | ChangeKind::Renamed) {
                items.push(WatchItem::Error(WatchError::RootRemoved(path)));
            }
            continue;
        }

        if !filter.matches(&path) {
            continue;
        }

        tracing::debug!(path = %path.display(), ?kind, "Recorded filesystem event");
        items.push(WatchItem::Change(ChangeEvent::new(path, kind)));
    }
    items
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};

    use super::*;

    fn changes(items: &[WatchItem]) -> Vec<(PathBuf, ChangeKind)> {
        items
            .iter()
            .filter_map(|item| match item {
                WatchItem::Change(e) => Some((e.path.clone(), e.kind)),
                WatchItem::Error(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_translate_maps_kinds() {
        let root = Path::new("/site");
        let filter = ExtensionFilter::all();

        let cases = [
            (EventKind::Create(CreateKind::File), ChangeKind::Created),
            (
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                ChangeKind::Modified,
            ),
            (
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                ChangeKind::Renamed,
            ),
            (EventKind::Remove(RemoveKind::File), ChangeKind::Removed),
        ];

        for (notify_kind, expected) in cases {
            let event = Event::new(notify_kind).add_path(PathBuf::from("/site/a.css"));
            let items = translate(Ok(event), root, &filter);
            assert_eq!(
                changes(&items),
                vec![(PathBuf::from("/site/a.css"), expected)]
            );
        }
    }

    #[test]
    fn test_translate_ignores_access_events() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/site/a.css"));

        let items = translate(Ok(event), Path::new("/site"), &ExtensionFilter::all());

        assert!(items.is_empty());
    }

    #[test]
    fn test_translate_applies_extension_filter() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/a.css"))
            .add_path(PathBuf::from("/site/.a.css.swp"))
            .add_path(PathBuf::from("/site/b.html"));
        let filter = ExtensionFilter::new([".css", ".html"]);

        let items = translate(Ok(event), Path::new("/site"), &filter);

        assert_eq!(
            changes(&items),
            vec![
                (PathBuf::from("/site/a.css"), ChangeKind::Modified),
                (PathBuf::from("/site/b.html"), ChangeKind::Modified),
            ]
        );
    }

    #[test]
    fn test_translate_reports_root_removal() {
        let event =
            Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(PathBuf::from("/site"));

        let items = translate(Ok(event), Path::new("/site"), &ExtensionFilter::all());

        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            WatchItem::Error(WatchError::RootRemoved(p)) if p == Path::new("/site")
        ));
    }

    #[test]
    fn test_translate_forwards_backend_errors() {
        let items = translate(
            Err(notify::Error::generic("inotify limit reached")),
            Path::new("/site"),
            &ExtensionFilter::all(),
        );

        assert!(matches!(&items[0], WatchItem::Error(WatchError::Notify(_))));
    }

    #[test]
    fn test_start_on_missing_root_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut watcher =
            ChangeWatcher::new(temp_dir.path().join("missing"), ExtensionFilter::all());

        let result = watcher.start();

        assert!(matches!(result, Err(WatchError::RootUnavailable { .. })));
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_start_stop_restart() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut watcher = ChangeWatcher::new(temp_dir.path().to_path_buf(), ExtensionFilter::all());

        let _stream = watcher.start().unwrap();
        assert!(watcher.is_running());

        watcher.stop();
        assert!(!watcher.is_running());

        let _stream = watcher.start().unwrap();
        assert!(watcher.is_running());
    }

    // File watching tests are ignored because they're timing-sensitive and can be flaky
    // in test environments.
    #[tokio::test]
    #[ignore]
    async fn test_watch_detects_modification() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(temp_dir.path()).unwrap();
        std::fs::write(root.join("style.css"), "body {}").unwrap();

        let mut watcher = ChangeWatcher::new(root.clone(), ExtensionFilter::new([".css"]));
        let mut stream = watcher.start().unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(root.join("style.css"), "body { color: red }").unwrap();
        std::fs::write(root.join("notes.txt"), "ignored").unwrap();

        let item = tokio::time::timeout(Duration::from_secs(2), stream.recv())
            .await
            .expect("Expected an event before timeout");
        match item {
            Some(WatchItem::Change(event)) => assert_eq!(event.path, root.join("style.css")),
            other => panic!("Expected change event, got {other:?}"),
        }
    }
}
