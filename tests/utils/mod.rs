use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use collabroom::room::repository::InMemoryRoomRepository;
use collabroom::{
    BroadcastRouter, ConnectionRegistry, InMemoryConnectionRegistry, RoomService,
    SessionCoordinator,
};

/// Test fixture wiring the coordinator to in-memory store and registry.
/// Connections are backed by plain channels, so every delivered event
/// can be asserted on directly.
pub struct TestSetup {
    pub coordinator: Arc<SessionCoordinator>,
    pub registry: Arc<InMemoryConnectionRegistry>,
    pub room_service: Arc<RoomService>,
}

impl TestSetup {
    pub fn new() -> Self {
        let room_service = Arc::new(RoomService::new(Arc::new(InMemoryRoomRepository::new())));
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let reg: Arc<dyn ConnectionRegistry> = registry.clone();
        let router = Arc::new(BroadcastRouter::new(Arc::clone(&reg)));
        let coordinator = Arc::new(SessionCoordinator::new(
            Arc::clone(&room_service),
            reg,
            router,
        ));

        Self {
            coordinator,
            registry,
            room_service,
        }
    }

    /// Registers a connection as if its transport had just been
    /// established, returning the client's receive side
    pub async fn connect(&self, connection_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.register(connection_id.to_string(), tx).await;
        rx
    }

    pub async fn create_room(&self, connection_id: &str, name: &str, pass_code: &str, email: &str) {
        self.coordinator
            .handle_create_room(connection_id, name, pass_code, email)
            .await;
    }

    pub async fn join_room(
        &self,
        connection_id: &str,
        room_code: &str,
        pass_code: &str,
        email: &str,
    ) {
        self.coordinator
            .handle_join_room(connection_id, room_code, pass_code, email)
            .await;
    }

    pub async fn disconnect(&self, connection_id: &str) {
        self.coordinator.handle_disconnect(connection_id).await;
    }

    /// Current active-user emails for a room, straight from the store
    pub async fn active_users(&self, room_code: &str) -> Vec<String> {
        self.room_service
            .get_room(room_code)
            .await
            .unwrap()
            .map(|room| room.active_emails())
            .unwrap_or_default()
    }
}

/// Drains every pending event from a client receiver as parsed JSON
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        events.push(serde_json::from_str(&message).expect("event should be valid JSON"));
    }
    events
}

/// Event types, in delivery order
pub fn event_types(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap_or_default().to_string())
        .collect()
}
