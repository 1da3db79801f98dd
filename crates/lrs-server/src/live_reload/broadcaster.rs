//! Fan-out of reload signals to registered clients.

use std::sync::Arc;

use lrs_watch::ReloadSignal;

use super::registry::ClientRegistry;

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients the signal was handed to.
    pub delivered: usize,
    /// Clients found dead and removed.
    pub dropped: usize,
}

/// Pushes reload signals to every client in a [`ClientRegistry`].
#[derive(Clone)]
pub struct ReloadBroadcaster {
    registry: Arc<ClientRegistry>,
}

impl ReloadBroadcaster {
    /// Create a broadcaster over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `signal` to every registered client.
    ///
    /// Iterates a snapshot taken under the registry lock, so clients may
    /// connect or disconnect concurrently. A client whose receiver is gone is
    /// unregistered and counted as dropped; the remaining clients still get
    /// the signal.
    pub fn broadcast(&self, signal: &ReloadSignal) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (id, sender) in self.registry.snapshot() {
            if sender.send(Some(signal.clone())).is_ok() {
                report.delivered += 1;
            } else {
                tracing::debug!(client = %id, "Dropping disconnected live reload client");
                self.registry.unregister(id);
                report.dropped += 1;
            }
        }

        report
    }
}
