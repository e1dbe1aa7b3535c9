// Library crate for the collaborative room server
// This file exposes the public API for integration tests

pub mod room;
pub mod session;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use room::{models::RoomModel, repository::RoomRepository, service::RoomService};
pub use session::SessionCoordinator;
pub use shared::{AppError, AppState};
pub use websockets::{
    BroadcastRouter, ClientEvent, ConnectionRegistry, InMemoryConnectionRegistry, MessageHandler,
    ServerEvent, WebsocketReceiveHandler,
};
