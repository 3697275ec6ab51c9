use dashmap::DashMap;
use game_types::{PlayerId, ServerMessage, SessionCode};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: Option<PlayerId>,
    pub session_code: Option<SessionCode>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            user_id: None,
            session_code: None,
            connected_at: now,
            last_activity: now,
            sender,
        };

        (connection, receiver)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// Registry of open sockets. Removing an entry drops its sender, which ends
/// the socket's outgoing loop and closes it.
#[derive(Default)]
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_connection(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);
        self.connections.insert(id, conn);
        receiver
    }

    pub fn remove_connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    pub fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|conn| conn.clone())
    }

    pub fn update_activity(&self, id: ConnectionId) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.last_activity = Instant::now();
        }
    }

    pub fn set_user(&self, id: ConnectionId, user_id: Option<PlayerId>) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.user_id = user_id;
        }
    }

    pub fn set_session(&self, id: ConnectionId, code: Option<SessionCode>) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.session_code = code;
        }
    }

    pub fn send_to_connection(&self, id: ConnectionId, message: ServerMessage) -> Result<(), String> {
        match self.connections.get(&id) {
            Some(conn) => conn.send_message(message),
            None => Err(format!("Connection {} not found", id)),
        }
    }

    pub fn connections_in_session(&self, code: &str) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|entry| entry.session_code.as_deref() == Some(code))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Drops connections idle for longer than `timeout`; returns their ids.
    pub fn cleanup_inactive_connections(&self, timeout: Duration) -> Vec<ConnectionId> {
        let inactive: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| entry.is_inactive(timeout))
            .map(|entry| *entry.key())
            .collect();

        for id in &inactive {
            self.connections.remove(id);
            tracing::info!("Closed inactive connection {}", id);
        }
        inactive
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn authenticated_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.is_authenticated())
            .count()
    }
}
