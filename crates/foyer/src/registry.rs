//! Every authenticated connection on the server, keyed by connection id.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use foyer_room::{ClientSender, Frame};
use foyer_transport::ConnectionId;
use tokio::sync::Mutex;

/// What the server remembers about one authenticated connection.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub connection_id: ConnectionId,
    pub username: String,
    pub display_name: String,
    pub address: SocketAddr,
    /// The token presented at handshake; every later message must carry it.
    pub token: String,
    /// `None` while the client is in the foyer.
    pub current_room: Option<String>,
    pub outbox: ClientSender,
}

/// Registry of connected clients.
///
/// Held on its own lock, never while a room or directory lock is held.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ConnectionId, ClientSession>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: ClientSession) {
        let mut clients = self.clients.lock().await;
        tracing::debug!(
            conn_id = %session.connection_id,
            name = %session.display_name,
            clients = clients.len() + 1,
            "client registered"
        );
        clients.insert(session.connection_id, session);
    }

    pub async fn remove(&self, id: ConnectionId) -> Option<ClientSession> {
        self.clients.lock().await.remove(&id)
    }

    pub async fn get(&self, id: ConnectionId) -> Option<ClientSession> {
        self.clients.lock().await.get(&id).cloned()
    }

    /// Records which room `id` is in. Returns `false` for an unknown id.
    pub async fn set_room(&self, id: ConnectionId, room: Option<String>) -> bool {
        match self.clients.lock().await.get_mut(&id) {
            Some(session) => {
                session.current_room = room;
                true
            }
            None => false,
        }
    }

    pub async fn current_room(&self, id: ConnectionId) -> Option<String> {
        self.clients
            .lock()
            .await
            .get(&id)
            .and_then(|s| s.current_room.clone())
    }

    /// Queues `frame` to every client currently in the foyer. Returns how
    /// many queues accepted it.
    pub async fn send_to_foyer(&self, frame: &Frame) -> usize {
        self.clients
            .lock()
            .await
            .values()
            .filter(|s| s.current_room.is_none())
            .filter(|s| s.outbox.send(Arc::clone(frame)).is_ok())
            .count()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}
