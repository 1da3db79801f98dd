//! Filesystem change watching and reload debouncing.
//!
//! This crate turns raw filesystem notifications into debounced reload
//! instructions for connected browsers:
//!
//! ```text
//! notify thread ──► ChangeWatcher ──bounded queue──► ChangeStream
//!                                                         │
//!                                      run_debouncer ◄────┘
//!                                            │
//!                                            └─► ReloadSignal (≤ 1 per window)
//! ```
//!
//! - [`ChangeWatcher`] watches a root directory recursively and drops events
//!   whose extension is not in its [`ExtensionFilter`].
//! - [`Debouncer`] collapses a burst into one [`ReloadSignal`] whose
//!   [`ReloadScope`] is the most severe scope seen in the window.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use lrs_watch::{ChangeWatcher, ExtensionFilter, run_debouncer};
//!
//! let mut watcher = ChangeWatcher::new(root, ExtensionFilter::new([".css", ".html"]));
//! let stream = watcher.start()?;
//! tokio::spawn(run_debouncer(stream, Duration::from_millis(200), shutdown_rx, |signal| {
//!     println!("reload: {:?}", signal.scope);
//! }));
//! ```

mod debouncer;
mod event;
mod watcher;

pub use debouncer::{Debouncer, run_debouncer};
pub use event::{
    ChangeEvent, ChangeKind, ExtensionFilter, ReloadScope, ReloadSignal, STYLE_EXTENSIONS,
};
pub use watcher::{ChangeStream, ChangeWatcher, WatchError, WatchItem};
