use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Process-local state for one live connection
///
/// `email` and `room_code` are unset until the connection joins or
/// creates a room; a connection maps to at most one room at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEntry {
    pub connection_id: String,
    pub email: Option<String>,
    pub room_code: Option<String>,
    pub cursor_position: i64,
    pub typing: bool,
    pub current_file: Option<String>,
}

impl ConnectionEntry {
    fn new(connection_id: String) -> Self {
        Self {
            connection_id,
            email: None,
            room_code: None,
            cursor_position: 0,
            typing: false,
            current_file: None,
        }
    }
}

/// Partial update to a connection entry. Unset fields are left unchanged;
/// `room_code` and `current_file` can be explicitly cleared.
#[derive(Debug, Clone, Default)]
pub struct ConnectionUpdate {
    pub email: Option<String>,
    pub room_code: Option<Option<String>>,
    pub cursor_position: Option<i64>,
    pub typing: Option<bool>,
    pub current_file: Option<Option<String>>,
}

/// Registry mapping live connections to their user, room and presence
/// fields. No code outside this trait's implementations touches
/// connection state directly.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Registers a connection at transport establishment. The entry
    /// starts idle: no email, no room.
    async fn register(&self, connection_id: String, sender: mpsc::UnboundedSender<String>);

    async fn lookup(&self, connection_id: &str) -> Option<ConnectionEntry>;

    /// Applies a partial update and returns the updated entry, or `None`
    /// if the connection is not registered.
    async fn update(
        &self,
        connection_id: &str,
        update: ConnectionUpdate,
    ) -> Option<ConnectionEntry>;

    /// Removes a connection entry, returning it so that callers resolve
    /// user and room before the entry is gone.
    async fn remove(&self, connection_id: &str) -> Option<ConnectionEntry>;

    /// Fire-and-forget delivery to a single connection
    async fn send_raw(&self, connection_id: &str, message: &str);

    /// Fire-and-forget delivery to every connection in a room, except
    /// the one named in `except`
    async fn broadcast_raw(&self, room_code: &str, except: Option<&str>, message: &str);
}

struct RegisteredConnection {
    entry: ConnectionEntry,
    sender: mpsc::UnboundedSender<String>,
}

/// In-memory implementation guarded by a single RwLock: no two events
/// observe a torn intermediate state.
pub struct InMemoryConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, RegisteredConnection>>>,
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(&self, connection_id: String, sender: mpsc::UnboundedSender<String>) {
        let mut connections = self.connections.write().await;
        let entry = ConnectionEntry::new(connection_id.clone());
        connections.insert(connection_id, RegisteredConnection { entry, sender });
    }

    async fn lookup(&self, connection_id: &str) -> Option<ConnectionEntry> {
        let connections = self.connections.read().await;
        connections.get(connection_id).map(|c| c.entry.clone())
    }

    async fn update(
        &self,
        connection_id: &str,
        update: ConnectionUpdate,
    ) -> Option<ConnectionEntry> {
        let mut connections = self.connections.write().await;
        let conn = connections.get_mut(connection_id)?;

        if let Some(email) = update.email {
            conn.entry.email = Some(email);
        }
        if let Some(room_code) = update.room_code {
            conn.entry.room_code = room_code;
        }
        if let Some(cursor_position) = update.cursor_position {
            conn.entry.cursor_position = cursor_position;
        }
        if let Some(typing) = update.typing {
            conn.entry.typing = typing;
        }
        if let Some(current_file) = update.current_file {
            conn.entry.current_file = current_file;
        }

        Some(conn.entry.clone())
    }

    async fn remove(&self, connection_id: &str) -> Option<ConnectionEntry> {
        let mut connections = self.connections.write().await;
        connections.remove(connection_id).map(|c| c.entry)
    }

    async fn send_raw(&self, connection_id: &str, message: &str) {
        let connections = self.connections.read().await;
        if let Some(conn) = connections.get(connection_id) {
            // Recipient may be tearing down; dropped messages are fine
            let _ = conn.sender.send(message.to_string());
        }
    }

    async fn broadcast_raw(&self, room_code: &str, except: Option<&str>, message: &str) {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for conn in connections.values() {
            if conn.entry.room_code.as_deref() != Some(room_code) {
                continue;
            }
            if Some(conn.entry.connection_id.as_str()) == except {
                continue;
            }
            let _ = conn.sender.send(message.to_string());
            delivered += 1;
        }
        debug!(room_code = %room_code, delivered, "Room broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        mpsc::unbounded_channel()
    }

    fn join_update(email: &str, room_code: &str) -> ConnectionUpdate {
        ConnectionUpdate {
            email: Some(email.to_string()),
            room_code: Some(Some(room_code.to_string())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx, _rx) = channel();

        registry.register("conn-1".to_string(), tx).await;

        let entry = registry.lookup("conn-1").await.unwrap();
        assert_eq!(entry.connection_id, "conn-1");
        assert!(entry.email.is_none());
        assert!(entry.room_code.is_none());
        assert!(!entry.typing);
    }

    #[tokio::test]
    async fn test_update_partial_fields() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx, _rx) = channel();
        registry.register("conn-1".to_string(), tx).await;

        registry
            .update("conn-1", join_update("a@x.com", "ABC123"))
            .await
            .unwrap();

        let entry = registry
            .update(
                "conn-1",
                ConnectionUpdate {
                    cursor_position: Some(42),
                    typing: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Untouched fields survive the partial update
        assert_eq!(entry.email.as_deref(), Some("a@x.com"));
        assert_eq!(entry.room_code.as_deref(), Some("ABC123"));
        assert_eq!(entry.cursor_position, 42);
        assert!(entry.typing);
    }

    #[tokio::test]
    async fn test_update_unknown_connection() {
        let registry = InMemoryConnectionRegistry::new();

        let result = registry
            .update("ghost", ConnectionUpdate::default())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_remove_returns_entry_once() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx, _rx) = channel();
        registry.register("conn-1".to_string(), tx).await;
        registry
            .update("conn-1", join_update("a@x.com", "ABC123"))
            .await;

        let entry = registry.remove("conn-1").await.unwrap();
        assert_eq!(entry.room_code.as_deref(), Some("ABC123"));

        // Second removal is a no-op
        assert!(registry.remove("conn-1").await.is_none());
        assert!(registry.lookup("conn-1").await.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender_and_other_rooms() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        let (tx_c, mut rx_c) = channel();

        registry.register("conn-a".to_string(), tx_a).await;
        registry.register("conn-b".to_string(), tx_b).await;
        registry.register("conn-c".to_string(), tx_c).await;

        registry
            .update("conn-a", join_update("a@x.com", "ABC123"))
            .await;
        registry
            .update("conn-b", join_update("b@x.com", "ABC123"))
            .await;
        registry
            .update("conn-c", join_update("c@x.com", "OTHER"))
            .await;

        registry
            .broadcast_raw("ABC123", Some("conn-a"), "hello")
            .await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "hello");
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_raw_to_unknown_connection_is_silent() {
        let registry = InMemoryConnectionRegistry::new();

        // Must not panic or error
        registry.send_raw("ghost", "hello").await;
    }

    #[tokio::test]
    async fn test_idle_connections_receive_no_broadcasts() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx, mut rx) = channel();
        registry.register("conn-1".to_string(), tx).await;

        registry.broadcast_raw("ABC123", None, "hello").await;

        assert!(rx.try_recv().is_err());
    }
}
