//! Change debouncing.
//!
//! Collapses bursts of change events into at most one [`ReloadSignal`] per
//! window. Editors commonly emit several events per save (write temp file,
//! rename, touch metadata), which would otherwise reload the browser several
//! times.
//!
//! [`Debouncer`] is the synchronous state machine; [`run_debouncer`] drives it
//! from a [`ChangeStream`] on a tokio task.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::event::{ChangeEvent, ReloadScope, ReloadSignal};
use crate::watcher::{ChangeStream, WatchItem};

/// Debouncer state.
#[derive(Debug)]
enum State {
    Idle,
    Pending {
        scope: ReloadScope,
        deadline: Instant,
        paths: Vec<PathBuf>,
    },
}

/// Two-state debouncer: `Idle` and `Pending`.
///
/// While pending, each new event resets the deadline and may upgrade the
/// scope to [`ReloadScope::Full`]; the scope never downgrades within a window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    state: State,
}

impl Debouncer {
    /// Create a debouncer with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: State::Idle,
        }
    }

    /// Whether a signal is waiting for its deadline.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending { .. })
    }

    /// Record an event observed at `now`.
    pub fn record(&mut self, event: &ChangeEvent, now: Instant) {
        let event_scope = event.scope();
        let new_deadline = now + self.window;

        match &mut self.state {
            State::Idle => {
                self.state = State::Pending {
                    scope: event_scope,
                    deadline: new_deadline,
                    paths: vec![event.path.clone()],
                };
            }
            State::Pending {
                scope,
                deadline,
                paths,
            } => {
                *scope = scope.merge(event_scope);
                *deadline = new_deadline;
                if !paths.contains(&event.path) {
                    paths.push(event.path.clone());
                }
            }
        }
    }

    /// Emit the pending signal if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<ReloadSignal> {
        match &self.state {
            State::Pending { deadline, .. } if *deadline <= now => {}
            _ => return None,
        }

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Pending { scope, paths, .. } => Some(ReloadSignal { scope, paths }),
            State::Idle => None,
        }
    }

    /// Deadline of the pending signal, for timer scheduling.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Pending { deadline, .. } => Some(*deadline),
            State::Idle => None,
        }
    }

    /// Drop any pending signal and return to `Idle`.
    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }
}

/// Drive a [`Debouncer`] from a change stream until shutdown.
///
/// A single timer is armed for the pending window and re-armed (not stacked)
/// whenever an event extends it. Each emitted signal is passed to `emit`.
/// Watcher errors are logged and consumption continues. When `shutdown`
/// flips to `true` (or its sender is dropped) any pending signal is
/// discarded. When the stream ends, a pending signal is still delivered.
pub async fn run_debouncer<F>(
    mut stream: ChangeStream,
    window: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut emit: F,
) where
    F: FnMut(ReloadSignal),
{
    let mut debouncer = Debouncer::new(window);
    let mut stream_open = true;

    loop {
        if *shutdown.borrow() {
            break;
        }
        if !stream_open && !debouncer.is_pending() {
            break;
        }

        let deadline = debouncer.next_deadline();

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            item = stream.recv(), if stream_open => match item {
                Some(WatchItem::Change(event)) => debouncer.record(&event, Instant::now()),
                Some(WatchItem::Error(err)) => {
                    tracing::warn!(error = %err, "File watcher error, live reload continues");
                }
                None => stream_open = false,
            },
            () = sleep_until(deadline) => {
                if let Some(signal) = debouncer.poll(Instant::now()) {
                    tracing::debug!(scope = ?signal.scope, files = signal.paths.len(), "Debounced reload");
                    emit(signal);
                }
            }
        }
    }

    if debouncer.is_pending() {
        tracing::debug!("Discarding pending reload on shutdown");
        debouncer.cancel();
    }
}

fn sleep_until(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
