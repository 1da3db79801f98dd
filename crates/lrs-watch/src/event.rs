//! Change and reload event types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Extensions whose changes only need a stylesheet refresh.
pub const STYLE_EXTENSIONS: &[&str] = &[".css"];

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// File was created.
    Created,
    /// File content or metadata was modified.
    Modified,
    /// File was removed.
    Removed,
    /// File was renamed (either side of the rename).
    Renamed,
}

/// A raw filesystem change.
///
/// Ephemeral: produced by the watcher, consumed by the debouncer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the changed file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Reload scope this change warrants.
    #[must_use]
    pub fn scope(&self) -> ReloadScope {
        ReloadScope::for_path(&self.path)
    }
}

/// How much of the page a client has to refresh.
///
/// Ordered by severity: [`ReloadScope::Full`] dominates
/// [`ReloadScope::StyleOnly`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ReloadScope {
    /// Re-fetch stylesheets without navigating.
    #[serde(rename = "style")]
    StyleOnly,
    /// Reload the whole page.
    #[serde(rename = "full")]
    Full,
}

impl ReloadScope {
    /// Scope for a changed file, derived from its extension.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        let is_style = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .is_some_and(|ext| STYLE_EXTENSIONS.contains(&ext.as_str()));

        if is_style { Self::StyleOnly } else { Self::Full }
    }

    /// Combine two scopes, keeping the more severe one.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }
}

/// One debounced reload instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadSignal {
    /// Accumulated scope of the window.
    pub scope: ReloadScope,
    /// Files that changed during the window, in first-seen order.
    pub paths: Vec<PathBuf>,
}

/// Extension allow-list for change events.
///
/// An empty filter accepts every path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Create a filter from extensions such as `.css` or `html`.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .filter(|ext| ext.len() > 1)
            .collect();
        Self { extensions }
    }

    /// Filter that accepts every path.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether a path passes the filter.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
        self.extensions.contains(&ext)
    }
}
