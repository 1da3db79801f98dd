//! Connected live reload clients.
//!
//! Every WebSocket connection registers here and receives a
//! [`ClientSubscription`]. Each client owns a single-slot `watch` channel, so a
//! signal that has not been picked up yet is replaced by the next one and a
//! client never observes signals out of order.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use lrs_watch::ReloadSignal;
use tokio::sync::watch;
use uuid::Uuid;

/// Sender half of a client's signal slot.
pub(crate) type SignalSender = Arc<watch::Sender<Option<ReloadSignal>>>;

/// Connection state as seen by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Client can receive signals.
    Open,
    /// Client went away; it is no longer listed and is removed on the next
    /// broadcast.
    Closed,
}

/// A registered live reload client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConnection {
    /// Unique client id.
    pub id: Uuid,
    /// Current state.
    pub state: ConnectionState,
    /// When the client registered.
    pub connected_at: DateTime<Utc>,
}

/// Receiving side handed to a connection handler.
#[derive(Debug)]
pub struct ClientSubscription {
    connection: ClientConnection,
    receiver: watch::Receiver<Option<ReloadSignal>>,
}

impl ClientSubscription {
    /// Client id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.connection.id
    }

    /// Connection record at registration time.
    #[must_use]
    pub fn connection(&self) -> &ClientConnection {
        &self.connection
    }

    /// Wait for the next signal.
    ///
    /// Returns `None` once the registry has let go of this client, either by
    /// [`ClientRegistry::unregister`] or [`ClientRegistry::close_all`].
    pub async fn recv(&mut self) -> Option<ReloadSignal> {
        loop {
            self.receiver.changed().await.ok()?;
            if let Some(signal) = self.receiver.borrow_and_update().clone() {
                return Some(signal);
            }
        }
    }
}

struct ClientEntry {
    connection: ClientConnection,
    sender: SignalSender,
}

/// Thread-safe set of connected clients.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<Uuid, ClientEntry>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client.
    pub fn register(&self) -> ClientSubscription {
        let (sender, receiver) = watch::channel(None);
        let connection = ClientConnection {
            id: Uuid::new_v4(),
            state: ConnectionState::Open,
            connected_at: Utc::now(),
        };

        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                connection.id,
                ClientEntry {
                    connection: connection.clone(),
                    sender: Arc::new(sender),
                },
            );

        tracing::debug!(client = %connection.id, "Live reload client registered");

        ClientSubscription {
            connection,
            receiver,
        }
    }

    /// Remove a client. Returns `false` if it was not registered.
    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();

        if removed {
            tracing::debug!(client = %id, "Live reload client unregistered");
        }
        removed
    }

    /// Snapshot of clients whose subscription is still open, oldest first.
    ///
    /// A client whose subscription was dropped stays registered (and counted
    /// by [`len`](Self::len)) until the next broadcast, but is not listed.
    #[must_use]
    pub fn list_active(&self) -> Vec<ClientConnection> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut connections: Vec<ClientConnection> = clients
            .values()
            .filter(|entry| !entry.sender.is_closed())
            .map(|entry| entry.connection.clone())
            .collect();
        connections.sort_by_key(|c| c.connected_at);
        connections
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every client. Their subscriptions end, which closes the sockets.
    ///
    /// Returns the number of clients that were registered.
    pub fn close_all(&self) -> usize {
        let drained: Vec<ClientEntry> = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        drained.len()
    }

    /// Clone the senders under the read lock so delivery happens without it.
    pub(crate) fn snapshot(&self) -> Vec<(Uuid, SignalSender)> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.sender)))
            .collect()
    }
}
